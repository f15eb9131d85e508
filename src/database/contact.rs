use chrono::{DateTime, NaiveDate, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use super::schema::contacts;
use crate::contact::{Contact, ContactFormData, ContactPatch, SocialMedia, non_blank};
use crate::error::{ContactError, Result};

const BIRTHDAY_FORMAT: &str = "%Y-%m-%d";

/// A `contacts` row, named the way the store names its columns.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = contacts)]
pub struct ContactRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub birthday: Option<String>,
    pub social_media: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ContactRow {
    pub fn from_form(id: String, form: &ContactFormData, now: i64) -> Result<Self> {
        Ok(Self {
            id,
            full_name: form.full_name.clone(),
            email: form.email.clone(),
            phone: form.phone.clone(),
            address: non_blank(form.address.clone()),
            notes: non_blank(form.notes.clone()),
            birthday: form.birthday.map(encode_birthday),
            social_media: encode_social_media(&form.social_media)?,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Insert form of a row: the contact columns plus their lowercased search copies.
#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = contacts)]
pub struct NewContact {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub birthday: Option<String>,
    pub social_media: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub full_name_search: String,
    pub email_search: String,
    pub phone_search: String,
    pub address_search: Option<String>,
    pub notes_search: Option<String>,
}

impl From<&ContactRow> for NewContact {
    fn from(row: &ContactRow) -> Self {
        Self {
            id: row.id.clone(),
            full_name: row.full_name.clone(),
            email: row.email.clone(),
            phone: row.phone.clone(),
            address: row.address.clone(),
            notes: row.notes.clone(),
            birthday: row.birthday.clone(),
            social_media: row.social_media.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            full_name_search: fold(&row.full_name),
            email_search: fold(&row.email),
            phone_search: fold(&row.phone),
            address_search: row.address.as_deref().map(fold),
            notes_search: row.notes.as_deref().map(fold),
        }
    }
}

impl TryFrom<ContactRow> for Contact {
    type Error = ContactError;

    fn try_from(row: ContactRow) -> Result<Self> {
        let birthday = row
            .birthday
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| {
                NaiveDate::parse_from_str(s, BIRTHDAY_FORMAT).map_err(|e| {
                    ContactError::store_unavailable(&format!("malformed birthday on contact {}", row.id), e)
                })
            })
            .transpose()?;

        let social_media = match row.social_media.as_deref() {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<SocialMedia>(raw)?,
            _ => SocialMedia::default(),
        };

        Ok(Contact {
            created_at: decode_timestamp(&row.id, row.created_at)?,
            updated_at: decode_timestamp(&row.id, row.updated_at)?,
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            notes: row.notes,
            birthday,
            social_media,
        })
    }
}

/// Column updates for a partial edit. `updated_at` is always written.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = contacts)]
pub struct ContactChangeset {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub birthday: Option<Option<String>>,
    pub social_media: Option<Option<String>>,
    pub updated_at: i64,
    pub full_name_search: Option<String>,
    pub email_search: Option<String>,
    pub phone_search: Option<String>,
    pub address_search: Option<Option<String>>,
    pub notes_search: Option<Option<String>>,
}

impl ContactChangeset {
    pub fn from_patch(patch: &ContactPatch, updated_at: i64) -> Result<Self> {
        let address = patch.address.clone().map(non_blank);
        let notes = patch.notes.clone().map(non_blank);
        Ok(Self {
            full_name: patch.full_name.clone(),
            email: patch.email.clone(),
            phone: patch.phone.clone(),
            full_name_search: patch.full_name.as_deref().map(fold),
            email_search: patch.email.as_deref().map(fold),
            phone_search: patch.phone.as_deref().map(fold),
            address_search: address.as_ref().map(|a| a.as_deref().map(fold)),
            notes_search: notes.as_ref().map(|n| n.as_deref().map(fold)),
            address,
            notes,
            birthday: patch.birthday.map(|b| b.map(encode_birthday)),
            social_media: patch
                .social_media
                .as_ref()
                .map(encode_social_media)
                .transpose()?,
            updated_at,
        })
    }
}

/// Case folding shared by the stored search columns and the query.
fn fold(value: &str) -> String {
    value.to_lowercase()
}

fn encode_birthday(date: NaiveDate) -> String {
    date.format(BIRTHDAY_FORMAT).to_string()
}

fn encode_social_media(social_media: &SocialMedia) -> Result<Option<String>> {
    if social_media.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(social_media)
        .map(Some)
        .map_err(|e| ContactError::store_unavailable("failed to encode social_media", e))
}

fn decode_timestamp(id: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        ContactError::StoreUnavailable(format!("malformed timestamp {millis} on contact {id}"))
    })
}

/// Escapes LIKE wildcards and wraps the lowercased query for a substring match.
pub fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in fold(query).chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub struct ContactQuery;

macro_rules! impl_contact_query_for_conn {
    (
        $list:ident,
        $get_by_id:ident,
        $search:ident,
        $count:ident,
        $insert:ident,
        $update:ident,
        $delete:ident,
        $conn_ty:ty
    ) => {
        pub fn $list(conn: &mut $conn_ty) -> Result<Vec<ContactRow>> {
            let items = contacts::table
                .select(ContactRow::as_select())
                .order((contacts::created_at.desc(), contacts::id.desc()))
                .load(conn)?;
            Ok(items)
        }

        pub fn $get_by_id(conn: &mut $conn_ty, id: &str) -> Result<Option<ContactRow>> {
            let item = contacts::table
                .select(ContactRow::as_select())
                .filter(contacts::id.eq(id))
                .first(conn)
                .optional()?;
            Ok(item)
        }

        pub fn $search(conn: &mut $conn_ty, query: &str) -> Result<Vec<ContactRow>> {
            let pattern = like_pattern(query);
            let items = contacts::table
                .select(ContactRow::as_select())
                .filter(
                    contacts::full_name_search
                        .like(&pattern)
                        .escape('\\')
                        .or(contacts::email_search.like(&pattern).escape('\\'))
                        .or(contacts::phone_search.like(&pattern).escape('\\'))
                        .or(contacts::address_search.like(&pattern).escape('\\'))
                        .or(contacts::notes_search.like(&pattern).escape('\\')),
                )
                .order((contacts::created_at.desc(), contacts::id.desc()))
                .load(conn)?;
            Ok(items)
        }

        pub fn $count(conn: &mut $conn_ty) -> Result<i64> {
            let count = contacts::table.count().get_result(conn)?;
            Ok(count)
        }

        pub fn $insert(conn: &mut $conn_ty, item: &NewContact) -> Result<()> {
            diesel::insert_into(contacts::table)
                .values(item)
                .execute(conn)?;
            Ok(())
        }

        pub fn $update(
            conn: &mut $conn_ty,
            id: &str,
            patch: &ContactPatch,
            now: i64,
        ) -> Result<ContactRow> {
            conn.transaction::<_, ContactError, _>(|conn| {
                let current = Self::$get_by_id(conn, id)?
                    .ok_or_else(|| ContactError::NotFound(id.to_owned()))?;
                let changeset = ContactChangeset::from_patch(patch, now.max(current.created_at))?;

                diesel::update(contacts::table.filter(contacts::id.eq(id)))
                    .set(&changeset)
                    .execute(conn)?;

                Self::$get_by_id(conn, id)?.ok_or_else(|| ContactError::NotFound(id.to_owned()))
            })
        }

        pub fn $delete(conn: &mut $conn_ty, id: &str) -> Result<()> {
            let removed = diesel::delete(contacts::table.filter(contacts::id.eq(id))).execute(conn)?;
            if removed == 0 {
                return Err(ContactError::NotFound(id.to_owned()));
            }
            Ok(())
        }
    };
}

impl ContactQuery {
    impl_contact_query_for_conn!(
        list_sqlite,
        get_by_id_sqlite,
        search_sqlite,
        count_sqlite,
        insert_sqlite,
        update_sqlite,
        delete_sqlite,
        SqliteConnection
    );

    impl_contact_query_for_conn!(
        list_postgres,
        get_by_id_postgres,
        search_postgres,
        count_postgres,
        insert_postgres,
        update_postgres,
        delete_postgres,
        PgConnection
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ContactRow {
        ContactRow {
            id: "c1".to_string(),
            full_name: "Jane Smith".to_string(),
            email: "jane@example.com".to_string(),
            phone: "+1 (555) 987-6543".to_string(),
            address: None,
            notes: Some("Project collaborator".to_string()),
            birthday: Some("1990-04-01".to_string()),
            social_media: Some(r#"{"linkedin":"https://linkedin.com/in/jane"}"#.to_string()),
            created_at: 1_704_153_600_000,
            updated_at: 1_704_153_600_000,
        }
    }

    #[test]
    fn test_row_translates_to_contact() {
        let contact = Contact::try_from(row()).unwrap();
        assert_eq!(contact.full_name, "Jane Smith");
        assert_eq!(contact.address, None);
        assert_eq!(contact.birthday, NaiveDate::from_ymd_opt(1990, 4, 1));
        assert_eq!(
            contact.social_media.linkedin.as_deref(),
            Some("https://linkedin.com/in/jane")
        );
        assert_eq!(contact.created_at.timestamp_millis(), 1_704_153_600_000);
        assert_eq!(contact.created_at, contact.updated_at);
    }

    #[test]
    fn test_form_translates_to_row_and_back() {
        let contact = Contact::try_from(row()).unwrap();
        let back = ContactRow::from_form(contact.id.clone(), &contact.form_data(), contact.created_at.timestamp_millis())
            .unwrap();
        assert_eq!(back, row());
    }

    #[test]
    fn test_empty_social_media_is_stored_as_null() {
        let form = ContactFormData::new("Ada", "ada@ex.com", "1");
        let row = ContactRow::from_form("x".to_string(), &form, 0).unwrap();
        assert_eq!(row.social_media, None);
        assert_eq!(row.birthday, None);
    }

    #[test]
    fn test_malformed_columns_surface_as_unavailable() {
        let mut bad = row();
        bad.birthday = Some("April 1st".to_string());
        assert!(matches!(Contact::try_from(bad), Err(ContactError::StoreUnavailable(_))));

        let mut bad = row();
        bad.social_media = Some("linkedin".to_string());
        assert!(matches!(Contact::try_from(bad), Err(ContactError::StoreUnavailable(_))));
    }

    #[test]
    fn test_changeset_clears_blank_optionals() {
        let patch = ContactPatch {
            address: Some(Some("   ".to_string())),
            social_media: Some(SocialMedia::default()),
            ..Default::default()
        };
        let changeset = ContactChangeset::from_patch(&patch, 42).unwrap();
        assert_eq!(changeset.address, Some(None));
        assert_eq!(changeset.address_search, Some(None));
        assert_eq!(changeset.social_media, Some(None));
        assert_eq!(changeset.notes, None);
        assert_eq!(changeset.full_name, None);
        assert_eq!(changeset.updated_at, 42);
    }

    #[test]
    fn test_search_columns_fold_unicode() {
        let mut accented = row();
        accented.full_name = "Émile Zola".to_string();
        accented.address = Some("Rue ÇA".to_string());

        let insert = NewContact::from(&accented);
        assert_eq!(insert.full_name, "Émile Zola");
        assert_eq!(insert.full_name_search, "émile zola");
        assert_eq!(insert.address_search.as_deref(), Some("rue ça"));
        assert_eq!(insert.notes_search.as_deref(), Some("project collaborator"));

        let patch = ContactPatch {
            full_name: Some("ÅSA".to_string()),
            notes: Some(Some("Über".to_string())),
            ..Default::default()
        };
        let changeset = ContactChangeset::from_patch(&patch, 1).unwrap();
        assert_eq!(changeset.full_name_search.as_deref(), Some("åsa"));
        assert_eq!(changeset.notes_search, Some(Some("über".to_string())));
        assert_eq!(changeset.email_search, None);
        assert_eq!(changeset.address_search, None);

        assert_eq!(like_pattern("Émile"), "%émile%");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Jane"), "%jane%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
