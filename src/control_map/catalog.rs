//! Canonical control maps offered to the user.

use super::{Action, ControlMap};
use lazy_static::lazy_static;
use uuid::Uuid;

/// Priority used by all catalog maps.
static CATALOG_PRIORITY: i32 = -1;

/// Stable map ID, so that Mender recognizes refreshes of the same request.
static CATALOG_ID: [u8; 16] = [
    0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef,
];

pub(crate) static STATE_INSTALL: &str = "ArtifactInstall_Enter";
pub(crate) static STATE_REBOOT: &str = "ArtifactReboot_Enter";
pub(crate) static STATE_COMMIT: &str = "ArtifactCommit_Enter";

lazy_static! {
    static ref PAUSE_ALL: ControlMap = build(None);
    static ref ENTRIES: Vec<Entry> = vec![
        Entry {
            key: "0",
            description: "Pause on all states",
            map: PAUSE_ALL.clone(),
        },
        Entry {
            key: "1",
            description: "Continue with Installing new software",
            map: build(Some(STATE_INSTALL)),
        },
        Entry {
            key: "2",
            description: "Continue with Rebooting",
            map: build(Some(STATE_REBOOT)),
        },
        Entry {
            key: "3",
            description: "Continue with Committing new software",
            map: build(Some(STATE_COMMIT)),
        },
    ];
}

/// A selectable catalog entry.
#[derive(Clone, Debug)]
pub(crate) struct Entry {
    /// Menu key selecting this entry.
    pub(crate) key: &'static str,
    pub(crate) description: &'static str,
    pub(crate) map: ControlMap,
}

/// Map pausing on every state, the fail-safe default.
pub(crate) fn pause_all() -> ControlMap {
    PAUSE_ALL.clone()
}

/// All entries, in menu order.
pub(crate) fn entries() -> &'static [Entry] {
    &ENTRIES
}

/// Find the entry selected by `key`.
pub(crate) fn lookup(key: &str) -> Option<&'static Entry> {
    ENTRIES.iter().find(|e| e.key == key)
}

/// Build a map pausing on all states except `proceed`.
fn build(proceed: Option<&str>) -> ControlMap {
    let action_for = |state: &str| {
        if proceed == Some(state) {
            Action::Continue
        } else {
            Action::Pause
        }
    };

    ControlMap::new(CATALOG_PRIORITY, Uuid::from_bytes(CATALOG_ID))
        .with_state(STATE_INSTALL, action_for(STATE_INSTALL))
        .with_state(STATE_REBOOT, action_for(STATE_REBOOT))
        .with_state(STATE_COMMIT, action_for(STATE_COMMIT))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions(map: &ControlMap) -> Vec<Action> {
        [STATE_INSTALL, STATE_REBOOT, STATE_COMMIT]
            .iter()
            .map(|s| map.action(s).unwrap())
            .collect()
    }

    #[test]
    fn catalog_actions() {
        use Action::{Continue, Pause};

        assert_eq!(actions(&pause_all()), vec![Pause, Pause, Pause]);
        assert_eq!(actions(&lookup("1").unwrap().map), vec![Continue, Pause, Pause]);
        assert_eq!(actions(&lookup("2").unwrap().map), vec![Pause, Continue, Pause]);
        assert_eq!(actions(&lookup("3").unwrap().map), vec![Pause, Pause, Continue]);
    }

    #[test]
    fn shared_identity() {
        let expected = Uuid::parse_str("01234567-89ab-cdef-0123-456789abcdef").unwrap();
        for entry in entries() {
            assert_eq!(entry.map.id(), expected);
            assert_eq!(entry.map.priority(), -1);
        }
    }

    #[test]
    fn wire_identity() {
        let payload = pause_all().to_payload().unwrap();
        assert!(payload.contains("\"id\": \"01234567-89ab-cdef-0123-456789abcdef\""));
        for entry in entries() {
            let payload = entry.map.to_payload().unwrap();
            assert!(payload.contains("01234567-89ab-cdef-0123-456789abcdef"));
        }
    }

    #[test]
    fn lookup_keys() {
        let keys: Vec<_> = entries().iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["0", "1", "2", "3"]);
        assert_eq!(lookup("0").unwrap().map, pause_all());
        assert!(lookup("4").is_none());
        assert!(lookup("").is_none());
        assert!(lookup("q").is_none());
    }
}
