//! Ledger operations. Handlers deserialize into the input types defined
//! here, and every function takes the shared [`AppState`](crate::state::AppState)
//! plus the authenticated caller, so the same code paths run under HTTP
//! and in tests.

pub mod attendance;
pub mod credentials;
pub mod dashboard;
pub mod leave;
pub mod payroll;
pub mod users;

use std::borrow::Cow;

use validator::ValidationError;

use crate::error::AppError;
use crate::model::user::WithOwner;
use crate::store::Store;

/// Attaches each record's owner summary in one store round trip.
pub async fn with_owners<T>(
    store: &dyn Store,
    records: Vec<T>,
    owner_of: impl Fn(&T) -> u64,
) -> Result<Vec<WithOwner<T>>, AppError> {
    let mut ids: Vec<u64> = records.iter().map(&owner_of).collect();
    ids.sort_unstable();
    ids.dedup();
    let owners = store.owner_summaries(&ids).await?;

    Ok(records
        .into_iter()
        .map(|record| {
            let employee = owners.get(&owner_of(&record)).cloned();
            WithOwner { record, employee }
        })
        .collect())
}

pub(crate) fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

pub(crate) fn validate_person_name(name: &str) -> Result<(), ValidationError> {
    if name.chars().all(|c| c.is_alphabetic() || c.is_whitespace()) {
        Ok(())
    } else {
        Err(invalid("name_chars", "Name can only contain letters and spaces"))
    }
}

/// Trims, upper-cases and drops blank employee codes.
pub(crate) fn normalize_employee_id(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_uppercase)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveDateTime};

    use crate::auth::gate::AuthUser;
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::model::role::Role;
    use crate::model::user::{JobDetails, NewUser};
    use crate::state::AppState;
    use crate::store::memory::MemoryStore;

    pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    pub fn config() -> Config {
        Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("memory://".into()),
            "JWT_SECRET" => Some("test-secret".into()),
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            _ => None,
        })
        .unwrap()
    }

    pub fn state(clock: Arc<ManualClock>) -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), config(), clock)
    }

    pub async fn user(state: &AppState, code: &str, role: Role) -> AuthUser {
        let user = state
            .store
            .insert_user(NewUser {
                employee_id: Some(code.to_string()),
                name: format!("User {code}"),
                email: format!("{}@example.com", code.to_lowercase()),
                password_hash: String::new(),
                role,
                job_details: JobDetails::default(),
                created_at: state.clock.now(),
            })
            .await
            .unwrap();
        AuthUser { user }
    }
}
