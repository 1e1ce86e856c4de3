use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::model::*;

// ── Slot Capacity Allocation ──────────────────────────────────────

/// Every hourly start time in `[opening, closing)` on each non-holiday day of
/// the store's window, in ascending order.
///
/// Stepping stops at midnight rather than wrapping, so a closing time of 23:30
/// yields a last slot at 23:00.
pub fn slot_starts(store: &PopupStore, holidays: &BTreeSet<NaiveDate>) -> Vec<NaiveDateTime> {
    let mut starts = Vec::new();
    let days = store
        .start_date
        .iter_days()
        .take_while(|d| *d <= store.end_date)
        .filter(|d| !holidays.contains(d));

    for day in days {
        let mut time = store.opening_time;
        while time < store.closing_time {
            starts.push(day.and_time(time));
            let (next, wrapped) = time.overflowing_add_signed(TimeDelta::hours(1));
            if wrapped != 0 {
                break;
            }
            time = next;
        }
    }
    starts
}

/// Split `total` into `n` shares: the first `total % n` get one extra.
/// The shares always sum to `total`.
pub fn distribute(total: u32, n: usize) -> Vec<u32> {
    if n == 0 {
        return Vec::new();
    }
    let base = (total as usize / n) as u32;
    let remainder = total as usize % n;
    (0..n)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Expand a store's window into slots and spread its total capacity over them.
///
/// Slots starting strictly before `now` are never created; capacity is divided
/// among the survivors only, earliest slots taking the surplus. An empty
/// result (all holidays, or the window already elapsed) is not an error.
pub fn allocate(store: &PopupStore, holidays: &BTreeSet<NaiveDate>, now: NaiveDateTime) -> Vec<Slot> {
    let mut starts = slot_starts(store, holidays);
    // Already ascending; the surplus assignment depends on it, so keep it explicit.
    starts.sort_unstable();
    starts.retain(|start| *start >= now);

    let shares = distribute(store.total_capacity, starts.len());
    starts
        .into_iter()
        .zip(shares)
        .map(|(start, capacity)| Slot::new(store.id, start, capacity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        date(d).and_time(time(h, 0))
    }

    fn store(start: u32, end: u32, open: NaiveTime, close: NaiveTime, capacity: u32) -> PopupStore {
        PopupStore::new("Pop", date(start), date(end), open, close, capacity)
    }

    fn capacities(slots: &[Slot]) -> Vec<u32> {
        slots.iter().map(|s| s.total_slot).collect()
    }

    // ── distribute ────────────────────────────────────────

    #[test]
    fn distribute_sums_to_total_for_any_split() {
        for total in [0u32, 1, 2, 7, 10, 11, 99, 1000] {
            for n in 1..=25usize {
                let shares = distribute(total, n);
                assert_eq!(shares.len(), n);
                assert_eq!(shares.iter().sum::<u32>(), total, "total={total} n={n}");

                let base = total / n as u32;
                let extra = shares.iter().filter(|&&s| s == base + 1).count();
                assert_eq!(extra, total as usize % n);
                assert!(shares.iter().all(|&s| s == base || s == base + 1));
                // Surplus sits at the front.
                assert!(shares.windows(2).all(|w| w[0] >= w[1]));
            }
        }
    }

    #[test]
    fn distribute_less_capacity_than_slots() {
        assert_eq!(distribute(2, 5), vec![1, 1, 0, 0, 0]);
        assert_eq!(distribute(0, 3), vec![0, 0, 0]);
        assert!(distribute(10, 0).is_empty());
    }

    // ── allocate ──────────────────────────────────────────

    #[test]
    fn ten_over_three_slots() {
        let s = store(1, 1, time(10, 0), time(13, 0), 10);
        let slots = allocate(&s, &BTreeSet::new(), at(1, 0));
        assert_eq!(capacities(&slots), vec![4, 3, 3]);
        let starts: Vec<_> = slots.iter().map(Slot::starts_at).collect();
        assert_eq!(starts, vec![at(1, 10), at(1, 11), at(1, 12)]);
    }

    #[test]
    fn eleven_over_three_slots() {
        let s = store(1, 1, time(10, 0), time(13, 0), 11);
        let slots = allocate(&s, &BTreeSet::new(), at(1, 0));
        assert_eq!(capacities(&slots), vec![4, 4, 3]);
    }

    #[test]
    fn all_holiday_window_yields_nothing() {
        let s = store(1, 3, time(10, 0), time(18, 0), 50);
        let holidays = BTreeSet::from([date(1), date(2), date(3)]);
        assert!(allocate(&s, &holidays, at(1, 0)).is_empty());
    }

    #[test]
    fn holidays_are_skipped() {
        let s = store(1, 3, time(10, 0), time(12, 0), 8);
        let holidays = BTreeSet::from([date(2)]);
        let slots = allocate(&s, &holidays, at(1, 0));
        assert_eq!(slots.len(), 4);
        assert!(slots.iter().all(|slot| slot.date != date(2)));
        assert_eq!(capacities(&slots), vec![2, 2, 2, 2]);
    }

    #[test]
    fn past_slots_dropped_before_distribution() {
        // Three slots on day 1, three on day 2; now is day 1 11:30.
        let s = store(1, 2, time(10, 0), time(13, 0), 10);
        let now = date(1).and_time(time(11, 30));
        let slots = allocate(&s, &BTreeSet::new(), now);

        assert!(slots.iter().all(|slot| slot.starts_at() >= now));
        assert_eq!(slots.first().unwrap().starts_at(), at(1, 12));
        assert_eq!(capacities(&slots), vec![3, 3, 2, 2]);
        assert_eq!(slots.iter().map(|s| s.total_slot).sum::<u32>(), 10);
    }

    #[test]
    fn slot_starting_exactly_now_is_kept() {
        let s = store(1, 1, time(10, 0), time(12, 0), 3);
        let slots = allocate(&s, &BTreeSet::new(), at(1, 10));
        assert_eq!(capacities(&slots), vec![2, 1]);
    }

    #[test]
    fn elapsed_window_yields_nothing() {
        let s = store(1, 2, time(10, 0), time(12, 0), 3);
        assert!(allocate(&s, &BTreeSet::new(), at(3, 0)).is_empty());
    }

    #[test]
    fn zero_capacity_still_creates_slots() {
        let s = store(1, 1, time(10, 0), time(12, 0), 0);
        let slots = allocate(&s, &BTreeSet::new(), at(1, 0));
        assert_eq!(capacities(&slots), vec![0, 0]);
    }

    #[test]
    fn fresh_slots_are_available_and_untouched() {
        let s = store(1, 1, time(10, 0), time(12, 0), 5);
        for slot in allocate(&s, &BTreeSet::new(), at(1, 0)) {
            assert_eq!(slot.status, SlotStatus::Available);
            assert_eq!(slot.available_slot, slot.total_slot);
            assert_eq!(slot.store_id, s.id);
        }
    }

    #[test]
    fn half_hour_opening_steps_by_whole_hours() {
        let s = store(1, 1, time(10, 30), time(12, 45), 3);
        let starts = slot_starts(&s, &BTreeSet::new());
        assert_eq!(
            starts,
            vec![date(1).and_time(time(10, 30)), date(1).and_time(time(11, 30)), date(1).and_time(time(12, 30))]
        );
    }

    #[test]
    fn late_closing_does_not_wrap_past_midnight() {
        let s = store(1, 1, time(22, 0), time(23, 30), 2);
        let starts = slot_starts(&s, &BTreeSet::new());
        assert_eq!(starts, vec![at(1, 22), at(1, 23)]);
    }
}
