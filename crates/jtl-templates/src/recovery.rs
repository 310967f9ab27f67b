//! Skip-to-synchronization-point recovery shared by the lexer and the parser.
//!
//! Both passes recover from malformed input the same way: advance an index
//! until an item from a synchronization set is reached, then resume. The
//! lexer indexes bytes of the source, the parser indexes tokens.

/// Advance from `start` until `is_sync(index)` holds, stopping at `end`.
///
/// Returns the first synchronizing index, or `end` if none was found. The
/// result is never before `start`, so callers always make progress or stop.
pub fn skip_to_sync(start: usize, end: usize, mut is_sync: impl FnMut(usize) -> bool) -> usize {
    let mut index = start;
    while index < end {
        if is_sync(index) {
            return index;
        }
        index += 1;
    }
    end.max(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_at_first_sync_item() {
        let items = [1, 2, 3, 0, 5, 0];
        assert_eq!(skip_to_sync(0, items.len(), |i| items[i] == 0), 3);
        assert_eq!(skip_to_sync(4, items.len(), |i| items[i] == 0), 5);
    }

    #[test]
    fn test_reaches_end_without_sync_item() {
        let items = [1, 2, 3];
        assert_eq!(skip_to_sync(0, items.len(), |i| items[i] == 0), 3);
    }

    #[test]
    fn test_start_past_end_does_not_move_backwards() {
        assert_eq!(skip_to_sync(7, 3, |_| true), 7);
    }

    #[test]
    fn test_start_on_sync_item_stays() {
        let bytes = b"ab%}cd";
        assert_eq!(skip_to_sync(2, bytes.len(), |i| bytes[i..].starts_with(b"%}")), 2);
    }
}
