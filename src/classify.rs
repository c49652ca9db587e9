use crate::source::{Item, ItemKind};

/// Only live stories are shown. Missing `deleted`/`dead` flags count as false.
pub fn is_displayable(item: &Item) -> bool {
    item.kind == Some(ItemKind::Story)
        && !item.deleted.unwrap_or(false)
        && !item.dead.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_kind(kind: ItemKind) -> Item {
        Item {
            id: 1,
            kind: Some(kind),
            ..Default::default()
        }
    }

    #[test]
    fn comment_never_displayable() {
        for (deleted, dead) in [(None, None), (Some(false), Some(false)), (Some(true), None)] {
            let mut it = with_kind(ItemKind::Comment);
            it.deleted = deleted;
            it.dead = dead;
            assert!(!is_displayable(&it));
        }
    }

    #[test]
    fn story_flags() {
        let plain = with_kind(ItemKind::Story);
        assert!(is_displayable(&plain));

        let mut deleted = plain.clone();
        deleted.deleted = Some(true);
        assert!(!is_displayable(&deleted));

        let mut dead = plain.clone();
        dead.dead = Some(true);
        assert!(!is_displayable(&dead));

        let mut explicit = plain;
        explicit.deleted = Some(false);
        explicit.dead = Some(false);
        assert!(is_displayable(&explicit));
    }

    #[test]
    fn other_types_and_missing_type_hidden() {
        for k in [ItemKind::Job, ItemKind::Poll, ItemKind::PollOpt, ItemKind::Other] {
            assert!(!is_displayable(&with_kind(k)));
        }
        let untyped = Item {
            id: 2,
            ..Default::default()
        };
        assert!(!is_displayable(&untyped));
    }
}
