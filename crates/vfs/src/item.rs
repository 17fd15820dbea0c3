use common::hash::hash_id;
use common::item::{is_link_name, parse_shortcut, FileItem, ItemAction};
use common::path::split_name;
use common::prelude::{FilesError, StorageType, VirtualPath};
use common::props::keys;

use crate::config::Config;
use crate::links::LinkRegistry;
use crate::node::{sidecar, Node, Tree};

/// Shortcut bodies are tiny; anything bigger is not a shortcut we wrote.
const MAX_SHORTCUT_BYTES: u64 = 64 * 1024;

/// The physical slot a node occupies: which tree, which directory inside it,
/// and the on-disk basename (a share mount's basename can differ from the
/// display name).
#[derive(Debug, Clone)]
pub struct Slot {
    pub tree: Tree,
    pub dir: VirtualPath,
    pub name: String,
}

/// Assembles the caller-facing [`FileItem`] DTO from a node, its sidecar
/// properties and the link registry.
pub struct ItemBuilder<'a> {
    pub user: &'a str,
    pub storage: StorageType,
    /// When listing in a public-link context, action URLs embed this hash
    /// instead of the item's own identity hash.
    pub public_hash: Option<&'a str>,
    pub links: &'a LinkRegistry,
    pub config: &'a Config,
}

impl ItemBuilder<'_> {
    pub async fn build(
        &self,
        slot: &Slot,
        logical_path: &VirtualPath,
        node: &Node,
    ) -> Result<FileItem, FilesError> {
        let props = sidecar::get(&slot.tree.physical(&slot.dir), &slot.name).await?;

        let mut item = FileItem {
            id: node.name.clone(),
            name: props.name.clone().unwrap_or_else(|| node.name.clone()),
            path: logical_path.clone(),
            full_path: logical_path.join(&node.name),
            type_str: Some(self.storage),
            size: node.size(),
            owner: props.owner.clone().unwrap_or_else(|| self.user.to_string()),
            last_modified: node.modified,
            is_folder: node.is_dir(),
            extended_props: props.extended_props.clone(),
            ..FileItem::default()
        };

        let identity = hash_id(self.user, self.storage, logical_path, &node.name);
        let action_hash = self.public_hash.unwrap_or(&identity).to_string();

        item.published = props
            .published
            .unwrap_or_else(|| {
                self.links
                    .is_published(self.user, self.storage, logical_path, &node.name)
            });

        if node.is_dir() {
            item.add_action(ItemAction::List);
        } else {
            item.etag = node
                .modified
                .map(|ts| format!("{:x}-{:x}", node.size(), ts.timestamp()))
                .unwrap_or_else(|| format!("{:x}", node.size()));
            item.add_action(ItemAction::View {
                url: format!("?download-file/{}/view", action_hash),
            });

            let mut link_url = None;
            if is_link_name(&node.name) && node.size() <= MAX_SHORTCUT_BYTES {
                let body = slot.tree.read(&slot.dir, &slot.name).await?;
                link_url = parse_shortcut(&String::from_utf8_lossy(&body));
            }
            match link_url {
                Some(url) => {
                    item.is_link = true;
                    item.link_url = Some(url.clone());
                    item.add_action(ItemAction::Open { url });
                    // content type of the wrapped target, not of the .url file
                    let (stem, _) = split_name(&node.name);
                    item.content_type = Some(guess_content_type(stem));
                }
                None => {
                    item.add_action(ItemAction::Download {
                        url: format!("?download-file/{}", action_hash),
                    });
                    item.content_type = Some(guess_content_type(&node.name));
                }
            }

            item.thumb = self.config.allow_thumbnails
                && node.size() < self.config.thumbnail_size_ceiling()
                && item
                    .content_type
                    .as_deref()
                    .map(|ct| ct.starts_with("image/"))
                    .unwrap_or(false);
        }

        if let Some(shared) = &node.shared {
            item.shared = true;
            item.group_id = Some(shared.group_id);
            item.initiator = Some(shared.initiator.clone());
            item.extended_props.insert(
                keys::SHARED_WITH_ME_ACCESS.to_string(),
                serde_json::to_value(shared.access)?,
            );
        }

        Ok(item)
    }
}

fn guess_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
