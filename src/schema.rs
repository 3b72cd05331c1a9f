diesel::table! {
    schedule (slot_day, slot_month, slot_time) {
        slot_day -> Int2,
        slot_month -> Int2,
        slot_time -> Text,
        username -> Text,
        booked_at -> Timestamptz,
    }
}
