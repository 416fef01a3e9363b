use std::path::PathBuf;

use notify::event::ModifyKind;
use notify::{Event, EventKind};

/// Operation carried by a raw filesystem notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Write,
    Remove,
    Rename,
    /// Permission / metadata change.
    Chmod,
    /// Access and anything else notify reports.
    Other,
}

impl From<EventKind> for ChangeKind {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Create(_) => Self::Create,
            EventKind::Modify(ModifyKind::Name(_)) => Self::Rename,
            EventKind::Modify(ModifyKind::Metadata(_)) => Self::Chmod,
            EventKind::Modify(_) => Self::Write,
            EventKind::Remove(_) => Self::Remove,
            _ => Self::Other,
        }
    }
}

/// A single path + operation pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChange {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl RawChange {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Splits a notify event into one change per affected path.
    pub fn from_event(event: Event) -> Vec<Self> {
        let kind = ChangeKind::from(event.kind);
        event
            .paths
            .into_iter()
            .map(|path| Self { kind, path })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, MetadataKind, RemoveKind, RenameMode};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ChangeKind::from(EventKind::Create(CreateKind::Folder)),
            ChangeKind::Create
        );
        assert_eq!(
            ChangeKind::from(EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            ChangeKind::Rename
        );
        assert_eq!(
            ChangeKind::from(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            ChangeKind::Chmod
        );
        assert_eq!(
            ChangeKind::from(EventKind::Modify(ModifyKind::Any)),
            ChangeKind::Write
        );
        assert_eq!(
            ChangeKind::from(EventKind::Remove(RemoveKind::Folder)),
            ChangeKind::Remove
        );
    }

    #[test]
    fn test_from_event_fans_out_paths() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path("/a/1.jpg".into())
            .add_path("/a/2.jpg".into());

        let changes = RawChange::from_event(event);
        assert_eq!(
            changes,
            vec![
                RawChange::new(ChangeKind::Create, "/a/1.jpg"),
                RawChange::new(ChangeKind::Create, "/a/2.jpg"),
            ]
        );
    }
}
