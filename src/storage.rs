use crate::entities;
use crate::errors::AquaError;
use crate::settings::{Database as DbCfg, Seed};
use base64ct::Encoding;
use chrono::Utc;
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: i64,
    pub last_login: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: i32,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: i32,
    pub station_id: i32,
    pub customer_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub rating: i32,
    pub feedback_text: String,
    pub suggestions: Option<String>,
    pub created_at: i64,
    pub status: FeedbackStatus,
}

/// Public submission payload. Content fields are never updated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeedback {
    pub station_id: i32,
    pub customer_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub rating: i32,
    pub feedback_text: String,
    pub suggestions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: i32,
    pub created_at: i64,
    pub expires_at: i64,
    pub remember: bool,
}

/// Triage state of a feedback entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    New,
    Read,
    Archived,
}

impl FeedbackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackStatus::New => "new",
            FeedbackStatus::Read => "read",
            FeedbackStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(FeedbackStatus::New),
            "read" => Some(FeedbackStatus::Read),
            "archived" => Some(FeedbackStatus::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregates for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub total: u64,
    /// Overall mean rating, rounded to 1 decimal; 0.0 when there is no feedback
    pub avg_rating: f64,
    pub stations: Vec<StationStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationStats {
    pub station_id: i32,
    pub name: String,
    pub count: u64,
    /// Mean rating for this station, rounded to 1 decimal; 0.0 with no feedback
    pub avg_rating: f64,
}

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, AquaError> {
    use migration::MigratorTrait;

    let db = Database::connect(&cfg.url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn random_id() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64ct::Base64UrlUnpadded::encode_string(&bytes)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

// ============================================================================
// Users
// ============================================================================

pub async fn create_user(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
    is_admin: bool,
) -> Result<User, AquaError> {
    use argon2::password_hash::{rand_core::OsRng, SaltString};
    use argon2::{Argon2, PasswordHasher};

    let created_at = Utc::now().timestamp();

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AquaError::Other(format!("Password hashing failed: {}", e)))?
        .to_string();

    let user = entities::user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        is_admin: Set(is_admin),
        created_at: Set(created_at),
        last_login: Set(None),
        ..Default::default()
    };

    let model = user.insert(db).await.map_err(unique_to_validation)?;
    Ok(user_from_model(model))
}

/// Self-service registration with the form-level validation rules applied.
/// Always creates a non-admin account.
pub async fn register_user(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<User, AquaError> {
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AquaError::Validation("All fields are required.".to_string()));
    }
    if password != confirm_password {
        return Err(AquaError::Validation("Passwords do not match.".to_string()));
    }
    if password.len() < 6 {
        return Err(AquaError::Validation(
            "Password must be at least 6 characters long.".to_string(),
        ));
    }

    use entities::user::{Column, Entity};
    let existing = Entity::find()
        .filter(
            sea_orm::Condition::any()
                .add(Column::Username.eq(username))
                .add(Column::Email.eq(email)),
        )
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(AquaError::Validation(
            "Username or email already exists.".to_string(),
        ));
    }

    create_user(db, username, email, password, false).await
}

pub async fn get_user_by_id(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<User>, AquaError> {
    use entities::user::Entity;

    Ok(Entity::find_by_id(id).one(db).await?.map(user_from_model))
}

pub async fn get_user_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<User>, AquaError> {
    use entities::user::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::Username.eq(username))
        .one(db)
        .await?
        .map(user_from_model))
}

pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<User>, AquaError> {
    use entities::user::{Column, Entity};

    Ok(Entity::find()
        .order_by_asc(Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(user_from_model)
        .collect())
}

pub async fn verify_user_password(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<Option<User>, AquaError> {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let user = match get_user_by_username(db, username).await? {
        Some(u) => u,
        None => return Ok(None),
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| AquaError::Other(format!("Invalid password hash: {}", e)))?;

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
    {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

pub async fn update_last_login(db: &DatabaseConnection, user_id: i32) -> Result<(), AquaError> {
    use entities::user::Entity;

    let user = Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AquaError::NotFound(format!("user {}", user_id)))?;

    let mut active: entities::user::ActiveModel = user.into();
    active.last_login = Set(Some(Utc::now().timestamp()));
    active.update(db).await?;
    Ok(())
}

/// Flips the admin flag. Fails with Forbidden when a user targets their own
/// account; returns the new flag value.
pub async fn toggle_admin(
    db: &DatabaseConnection,
    user_id: i32,
    acting_user_id: i32,
) -> Result<bool, AquaError> {
    use entities::user::Entity;

    if user_id == acting_user_id {
        return Err(AquaError::Forbidden(
            "Cannot modify your own admin status".to_string(),
        ));
    }

    let user = Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AquaError::NotFound(format!("user {}", user_id)))?;

    let new_flag = !user.is_admin;
    let mut active: entities::user::ActiveModel = user.into();
    active.is_admin = Set(new_flag);
    active.update(db).await?;
    Ok(new_flag)
}

/// Removes an account permanently. Same self-protection rule as toggle_admin.
pub async fn delete_user(
    db: &DatabaseConnection,
    user_id: i32,
    acting_user_id: i32,
) -> Result<(), AquaError> {
    use entities::user::Entity;

    if user_id == acting_user_id {
        return Err(AquaError::Forbidden(
            "Cannot delete your own account".to_string(),
        ));
    }

    let result = Entity::delete_by_id(user_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AquaError::NotFound(format!("user {}", user_id)));
    }
    Ok(())
}

fn user_from_model(model: entities::user::Model) -> User {
    User {
        id: model.id,
        username: model.username,
        email: model.email,
        password_hash: model.password_hash,
        is_admin: model.is_admin,
        created_at: model.created_at,
        last_login: model.last_login,
    }
}

fn unique_to_validation(err: sea_orm::DbErr) -> AquaError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AquaError::Validation("Username or email already exists.".to_string())
        }
        _ => AquaError::Db(err),
    }
}

// ============================================================================
// Sessions
// ============================================================================

pub async fn create_session(
    db: &DatabaseConnection,
    user_id: i32,
    ttl_secs: i64,
    remember: bool,
) -> Result<Session, AquaError> {
    let session_id = random_id();
    let now = Utc::now().timestamp();
    let expires_at = now + ttl_secs;

    let session = entities::session::ActiveModel {
        session_id: Set(session_id.clone()),
        user_id: Set(user_id),
        created_at: Set(now),
        expires_at: Set(expires_at),
        remember: Set(remember),
    };

    session.insert(db).await?;

    Ok(Session {
        session_id,
        user_id,
        created_at: now,
        expires_at,
        remember,
    })
}

pub async fn get_session(
    db: &DatabaseConnection,
    session_id: &str,
) -> Result<Option<Session>, AquaError> {
    use entities::session::{Column, Entity};

    if let Some(model) = Entity::find()
        .filter(Column::SessionId.eq(session_id))
        .one(db)
        .await?
    {
        // Check if session is expired
        let now = Utc::now().timestamp();
        if now > model.expires_at {
            return Ok(None);
        }

        Ok(Some(Session {
            session_id: model.session_id,
            user_id: model.user_id,
            created_at: model.created_at,
            expires_at: model.expires_at,
            remember: model.remember,
        }))
    } else {
        Ok(None)
    }
}

pub async fn delete_session(db: &DatabaseConnection, session_id: &str) -> Result<(), AquaError> {
    use entities::session::{Column, Entity};

    Entity::delete_many()
        .filter(Column::SessionId.eq(session_id))
        .exec(db)
        .await?;
    Ok(())
}

// ============================================================================
// Stations
// ============================================================================

/// Insert-if-absent by name. Safe to call on every startup; returns the
/// number of stations actually inserted.
pub async fn ensure_stations(
    db: &DatabaseConnection,
    names: &[String],
) -> Result<usize, AquaError> {
    use entities::station::{Column, Entity};

    let mut inserted = 0;
    for name in names {
        let existing = Entity::find().filter(Column::Name.eq(name)).one(db).await?;
        if existing.is_none() {
            let station = entities::station::ActiveModel {
                name: Set(name.clone()),
                created_at: Set(Utc::now().timestamp()),
                ..Default::default()
            };
            station.insert(db).await?;
            tracing::info!(station = %name, "Seeded station");
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Creates the default admin account when no user with that username exists.
/// Returns true when the account was created.
pub async fn ensure_default_admin(db: &DatabaseConnection, seed: &Seed) -> Result<bool, AquaError> {
    if get_user_by_username(db, &seed.admin_username).await?.is_some() {
        return Ok(false);
    }

    create_user(
        db,
        &seed.admin_username,
        &seed.admin_email,
        &seed.admin_password,
        true,
    )
    .await?;
    tracing::warn!(
        username = %seed.admin_username,
        "Default admin created - change the password after first login"
    );
    Ok(true)
}

pub async fn list_stations(db: &DatabaseConnection) -> Result<Vec<Station>, AquaError> {
    use entities::station::{Column, Entity};

    Ok(Entity::find()
        .order_by_asc(Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|m| Station {
            id: m.id,
            name: m.name,
            created_at: m.created_at,
        })
        .collect())
}

pub async fn get_station(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<Station>, AquaError> {
    use entities::station::Entity;

    Ok(Entity::find_by_id(id).one(db).await?.map(|m| Station {
        id: m.id,
        name: m.name,
        created_at: m.created_at,
    }))
}

// ============================================================================
// Feedback
// ============================================================================

pub async fn submit_feedback(
    db: &DatabaseConnection,
    input: NewFeedback,
) -> Result<Feedback, AquaError> {
    if get_station(db, input.station_id).await?.is_none() {
        return Err(AquaError::NotFound(format!(
            "station {}",
            input.station_id
        )));
    }
    if !(1..=5).contains(&input.rating) {
        return Err(AquaError::Validation(
            "Rating must be between 1 and 5.".to_string(),
        ));
    }
    if input.customer_name.is_empty() || input.feedback_text.is_empty() {
        return Err(AquaError::Validation(
            "Name and feedback text are required.".to_string(),
        ));
    }

    let created_at = Utc::now().timestamp();
    let feedback = entities::feedback::ActiveModel {
        station_id: Set(input.station_id),
        customer_name: Set(input.customer_name.clone()),
        email: Set(none_if_empty(input.email)),
        phone: Set(none_if_empty(input.phone)),
        rating: Set(input.rating),
        feedback_text: Set(input.feedback_text.clone()),
        suggestions: Set(none_if_empty(input.suggestions)),
        created_at: Set(created_at),
        status: Set(FeedbackStatus::New.as_str().to_string()),
        ..Default::default()
    };

    let model = feedback.insert(db).await?;
    Ok(feedback_from_model(model))
}

/// All feedback, most recent first.
pub async fn list_feedback(db: &DatabaseConnection) -> Result<Vec<Feedback>, AquaError> {
    use entities::feedback::{Column, Entity};

    Ok(Entity::find()
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(feedback_from_model)
        .collect())
}

pub async fn feedbacks_for_station(
    db: &DatabaseConnection,
    station_id: i32,
) -> Result<Vec<Feedback>, AquaError> {
    use entities::feedback::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::StationId.eq(station_id))
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(feedback_from_model)
        .collect())
}

pub async fn get_feedback(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<Feedback>, AquaError> {
    use entities::feedback::Entity;

    Ok(Entity::find_by_id(id)
        .one(db)
        .await?
        .map(feedback_from_model))
}

/// Sets the triage status. The stored status is untouched when the new value
/// is not one of new/read/archived.
pub async fn update_feedback_status(
    db: &DatabaseConnection,
    id: i32,
    new_status: &str,
) -> Result<Feedback, AquaError> {
    use entities::feedback::Entity;

    let status = FeedbackStatus::parse(new_status).ok_or_else(|| {
        AquaError::Validation(format!("Invalid status: {}", new_status))
    })?;

    let feedback = Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AquaError::NotFound(format!("feedback {}", id)))?;

    let mut active: entities::feedback::ActiveModel = feedback.into();
    active.status = Set(status.as_str().to_string());
    let model = active.update(db).await?;
    Ok(feedback_from_model(model))
}

pub async fn delete_feedback(db: &DatabaseConnection, id: i32) -> Result<(), AquaError> {
    use entities::feedback::Entity;

    let result = Entity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AquaError::NotFound(format!("feedback {}", id)));
    }
    Ok(())
}

/// Total count, overall mean rating, and per-station count/mean. Stations
/// with no feedback report a mean of 0.0.
pub async fn feedback_stats(db: &DatabaseConnection) -> Result<FeedbackStats, AquaError> {
    let stations = list_stations(db).await?;
    let all = list_feedback(db).await?;

    let total = all.len() as u64;
    let avg_rating = if all.is_empty() {
        0.0
    } else {
        round1(all.iter().map(|f| f.rating as f64).sum::<f64>() / all.len() as f64)
    };

    let mut per_station = Vec::with_capacity(stations.len());
    for station in stations {
        let ratings: Vec<i32> = all
            .iter()
            .filter(|f| f.station_id == station.id)
            .map(|f| f.rating)
            .collect();
        let count = ratings.len() as u64;
        let avg = if ratings.is_empty() {
            0.0
        } else {
            round1(ratings.iter().map(|&r| r as f64).sum::<f64>() / ratings.len() as f64)
        };
        per_station.push(StationStats {
            station_id: station.id,
            name: station.name,
            count,
            avg_rating: avg,
        });
    }

    Ok(FeedbackStats {
        total,
        avg_rating,
        stations: per_station,
    })
}

fn feedback_from_model(model: entities::feedback::Model) -> Feedback {
    // Unknown stored values should never happen (the column is only written
    // through FeedbackStatus); fall back to New rather than erroring the read path.
    let status = FeedbackStatus::parse(&model.status).unwrap_or(FeedbackStatus::New);
    Feedback {
        id: model.id,
        station_id: model.station_id,
        customer_name: model.customer_name,
        email: model.email,
        phone: model.phone,
        rating: model.rating,
        feedback_text: model.feedback_text,
        suggestions: model.suggestions,
        created_at: model.created_at,
        status,
    }
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
