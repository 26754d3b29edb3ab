//! Raw filesystem notifications, reduced to what the dispatcher needs.

use std::path::PathBuf;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// Kind of arrival signalled by the OS notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Created,
    Modified,
    MovedTo,
}

/// A single path-bearing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawEventKind,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, kind: RawEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Split a notify event into arrival events.
    ///
    /// Removals, accesses and the source half of a rename carry no arrival
    /// and yield nothing. For a two-path rename only the destination counts.
    pub fn from_notify(event: Event) -> Vec<RawEvent> {
        let kind = match event.kind {
            EventKind::Create(_) => RawEventKind::Created,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => return Vec::new(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                return event
                    .paths
                    .into_iter()
                    .nth(1)
                    .map(|dest| vec![RawEvent::new(dest, RawEventKind::MovedTo)])
                    .unwrap_or_default();
            }
            EventKind::Modify(ModifyKind::Name(_)) => RawEventKind::MovedTo,
            EventKind::Modify(_) => RawEventKind::Modified,
            _ => return Vec::new(),
        };

        event
            .paths
            .into_iter()
            .map(|path| RawEvent::new(path, kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_create_and_modify_map_to_arrivals() {
        let created = RawEvent::from_notify(event(
            EventKind::Create(CreateKind::File),
            &["/in/test.csv"],
        ));
        assert_eq!(
            created,
            vec![RawEvent::new("/in/test.csv", RawEventKind::Created)]
        );

        let modified = RawEvent::from_notify(event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/in/test.csv"],
        ));
        assert_eq!(modified[0].kind, RawEventKind::Modified);
    }

    #[test]
    fn test_rename_uses_destination_only() {
        let both = RawEvent::from_notify(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/in/tmp123", "/in/test.csv"],
        ));
        assert_eq!(
            both,
            vec![RawEvent::new("/in/test.csv", RawEventKind::MovedTo)]
        );

        let from = RawEvent::from_notify(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/in/test.csv"],
        ));
        assert!(from.is_empty());

        let to = RawEvent::from_notify(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/in/test.csv"],
        ));
        assert_eq!(to[0].kind, RawEventKind::MovedTo);
    }

    #[test]
    fn test_non_arrival_events_are_dropped() {
        assert!(
            RawEvent::from_notify(event(
                EventKind::Remove(RemoveKind::File),
                &["/in/test.csv"]
            ))
            .is_empty()
        );
        assert!(
            RawEvent::from_notify(event(
                EventKind::Access(AccessKind::Read),
                &["/in/test.csv"]
            ))
            .is_empty()
        );
    }
}
