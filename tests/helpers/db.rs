use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        // Create temporary SQLite database file
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        // Connect to database
        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        // Run migrations
        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

/// Create a test user for testing
pub async fn seed_test_user(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    is_admin: bool,
) -> aquavoice::storage::User {
    aquavoice::storage::create_user(
        db,
        username,
        &format!("{}@example.com", username),
        password,
        is_admin,
    )
    .await
    .expect("Failed to create test user")
}

/// Seed a station and return it
pub async fn seed_test_station(
    db: &DatabaseConnection,
    name: &str,
) -> aquavoice::storage::Station {
    aquavoice::storage::ensure_stations(db, &[name.to_string()])
        .await
        .expect("Failed to seed station");
    aquavoice::storage::list_stations(db)
        .await
        .expect("Failed to list stations")
        .into_iter()
        .find(|s| s.name == name)
        .expect("Seeded station not found")
}
