diesel::table! {
    contacts (id) {
        id -> Text,
        full_name -> Text,
        email -> Text,
        phone -> Text,
        address -> Nullable<Text>,
        notes -> Nullable<Text>,
        birthday -> Nullable<Text>,
        social_media -> Nullable<Text>,
        created_at -> BigInt,
        updated_at -> BigInt,
        full_name_search -> Text,
        email_search -> Text,
        phone_search -> Text,
        address_search -> Nullable<Text>,
        notes_search -> Nullable<Text>,
    }
}
