use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::model::*;

/// First date a calendar covers: today, or the store's opening day if later.
pub fn effective_start(store: &PopupStore, now: NaiveDateTime) -> NaiveDate {
    store.start_date.max(now.date())
}

/// Classify one day from its slots. Holiday beats full, full beats available.
pub fn day_status(date: NaiveDate, today: NaiveDate, slots: &[&Slot]) -> DayStatus {
    if date < today {
        return DayStatus::Past;
    }
    if slots.is_empty() {
        return DayStatus::Available;
    }
    if slots.iter().any(|s| s.is_holiday()) {
        DayStatus::Holiday
    } else if !slots.iter().any(|s| s.has_capacity()) {
        DayStatus::Full
    } else {
        DayStatus::Available
    }
}

/// One status per date in `[effective_start, store.end_date]`, chronological.
///
/// Slots outside that range are ignored. A store whose window has already
/// ended gets an empty map.
pub fn calendar(store: &PopupStore, slots: &[Slot], now: NaiveDateTime) -> BTreeMap<NaiveDate, DayStatus> {
    let start = effective_start(store, now);
    let today = now.date();

    let mut by_date: BTreeMap<NaiveDate, Vec<&Slot>> = BTreeMap::new();
    for slot in slots.iter().filter(|s| s.store_id == store.id) {
        by_date.entry(slot.date).or_default().push(slot);
    }

    start
        .iter_days()
        .take_while(|d| *d <= store.end_date)
        .map(|date| {
            let day = by_date.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            (date, day_status(date, today, day))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use ulid::Ulid;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, d).unwrap()
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        date(d).and_time(NaiveTime::from_hms_opt(h, 0, 0).unwrap())
    }

    fn popup(start: u32, end: u32) -> PopupStore {
        PopupStore::new(
            "Pop",
            date(start),
            date(end),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            100,
        )
    }

    fn slot(store_id: Ulid, d: u32, h: u32, available: u32) -> Slot {
        let mut s = Slot::new(store_id, at(d, h), 5);
        s.available_slot = available;
        s
    }

    #[test]
    fn covers_every_date_from_effective_start() {
        let s = popup(1, 10);
        let cal = calendar(&s, &[], at(4, 15));
        let dates: Vec<_> = cal.keys().copied().collect();
        let expected: Vec<_> = (4..=10).map(date).collect();
        assert_eq!(dates, expected);
        assert!(cal.values().all(|st| *st == DayStatus::Available));
    }

    #[test]
    fn future_store_starts_at_its_opening_day() {
        let s = popup(20, 22);
        let cal = calendar(&s, &[], at(1, 9));
        assert_eq!(cal.len(), 3);
        assert_eq!(cal.keys().next(), Some(&date(20)));
    }

    #[test]
    fn ended_store_has_empty_calendar() {
        let s = popup(1, 3);
        assert!(calendar(&s, &[], at(5, 0)).is_empty());
    }

    #[test]
    fn holiday_dominates_full() {
        let s = popup(1, 2);
        let slots = vec![slot(s.id, 1, 10, 0), Slot::holiday(s.id, date(1), s.opening_time)];
        let cal = calendar(&s, &slots, at(1, 0));
        assert_eq!(cal[&date(1)], DayStatus::Holiday);
    }

    #[test]
    fn holiday_dominates_remaining_capacity() {
        let s = popup(1, 1);
        let slots = vec![slot(s.id, 1, 10, 3), Slot::holiday(s.id, date(1), s.opening_time)];
        assert_eq!(calendar(&s, &slots, at(1, 0))[&date(1)], DayStatus::Holiday);
    }

    #[test]
    fn full_only_when_no_slot_has_capacity() {
        let s = popup(1, 2);
        let slots = vec![
            slot(s.id, 1, 10, 0),
            slot(s.id, 1, 11, 0),
            slot(s.id, 2, 10, 0),
            slot(s.id, 2, 11, 1),
        ];
        let cal = calendar(&s, &slots, at(1, 0));
        assert_eq!(cal[&date(1)], DayStatus::Full);
        assert_eq!(cal[&date(2)], DayStatus::Available);
    }

    #[test]
    fn past_rule_applies_before_today() {
        let slots: [&Slot; 0] = [];
        assert_eq!(day_status(date(1), date(2), &slots), DayStatus::Past);
        assert_eq!(day_status(date(2), date(2), &slots), DayStatus::Available);
    }

    #[test]
    fn other_store_slots_are_ignored() {
        let s = popup(1, 1);
        let foreign = Slot::holiday(Ulid::new(), date(1), s.opening_time);
        assert_eq!(calendar(&s, &[foreign], at(1, 0))[&date(1)], DayStatus::Available);
    }
}
