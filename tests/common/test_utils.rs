use dotenv::dotenv;
use once_cell::sync::OnceCell;
use sqlx::mysql::MySqlPool as Pool;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::Error;
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

static TEST_DB: OnceCell<Mutex<Option<TestDb>>> = OnceCell::new();
static DB_NAME: OnceCell<String> = OnceCell::new();

#[derive(Debug)]
pub struct TestDb {
    pub db_name: String,
}

// Create a connection pool without a database, used to create a new database
async fn create_connection_pool_without_db() -> Result<Pool, Error> {
    dotenv().ok();
    let db_url =
        env::var("ADMIN_DATABASE_URL").expect("ADMIN_DATABASE_URL must be set in .env file");

    let base_url = db_url.split("/").collect::<Vec<&str>>()[..3].join("/");

    MySqlPoolOptions::new()
        .max_connections(10)
        .connect(&base_url)
        .await
}

// Create a connection pool with a test database
async fn create_connection_pool_with_db(db_name: &str) -> Result<Pool, Error> {
    dotenv().ok();
    let db_url =
        env::var("ADMIN_DATABASE_URL").expect("ADMIN_DATABASE_URL must be set in .env file");

    let base_url = db_url.split("/").collect::<Vec<&str>>()[..3].join("/");

    MySqlPoolOptions::new()
        .max_connections(5)
        .connect(&format!("{}/{}", base_url, db_name))
        .await
}

impl TestDb {
    // Get the database instance - Setup function to initialize the test database for each test
    pub async fn get_instance(file_path: &str) -> Result<Pool, Error> {
        let test_name = file_path
            .split(['/', '\\']) // Handle both Unix and Windows paths
            .last()
            .unwrap_or(file_path)
            .trim_end_matches(".rs");

        // Try to get the database instance
        let test_db = TEST_DB.get_or_init(|| Mutex::new(None));
        let mut guard = test_db.lock().await;

        // If the database instance does not exist, create it
        if guard.is_none() {
            println!("Creating new database instance for {}", test_name);
            *guard = Some(Self::setup_database(test_name).await?);
        }

        // Save the database name
        let db_name = guard.as_ref().unwrap().db_name.clone();
        drop(guard);

        // Create a new connection pool for each test
        println!("Creating new connection pool");
        create_connection_pool_with_db(&db_name).await
    }

    // Setup function to initialize the test database for each test
    async fn setup_database(test_name: &str) -> Result<Self, Error> {
        // Create a unique database name by timestamp for each test
        let db_name = DB_NAME
            .get_or_init(|| {
                let timestamp = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_secs();
                let name = format!("airline_test_{}_{}", test_name, timestamp);
                println!("Generated database name: {}", name);
                name
            })
            .clone();

        println!("Setting up database: {}", db_name);
        let admin_pool = create_connection_pool_without_db().await?;

        println!("Creating fresh database");
        sqlx::query(&format!("CREATE DATABASE {}", db_name))
            .execute(&admin_pool)
            .await?;

        // Create a connection pool with the new database
        let pool = create_connection_pool_with_db(&db_name).await?;
        println!("Initializing tables");
        Self::create_tables(&pool).await?;
        println!("Inserting initial data");
        Self::insert_initial_data(&pool).await?;

        Ok(Self { db_name })
    }

    async fn create_tables(pool: &Pool) -> Result<(), Error> {
        let tables = vec![
            "CREATE TABLE IF NOT EXISTS user (
                id INT AUTO_INCREMENT PRIMARY KEY,
                username CHAR(255) NOT NULL,
                password CHAR(255) NOT NULL,
                role ENUM('ADMIN', 'USER') DEFAULT 'USER' NOT NULL,
                CONSTRAINT user_username_uindex UNIQUE (username)
            )",
            "CREATE TABLE IF NOT EXISTS customer_info (
                id INT NOT NULL PRIMARY KEY,
                name CHAR(255) NOT NULL,
                birth_date DATE NOT NULL,
                gender ENUM('male', 'female') NOT NULL,
                CONSTRAINT customer_info_user_id_fk
                    FOREIGN KEY (id) REFERENCES user(id)
                    ON DELETE CASCADE
            )",
            "CREATE TABLE IF NOT EXISTS flight_inventory (
                flight_id VARCHAR(32) NOT NULL PRIMARY KEY,
                economy_available INT NOT NULL,
                economy_total INT NOT NULL,
                economy_price_amount BIGINT NOT NULL,
                economy_price_currency CHAR(3) NOT NULL,
                business_available INT NOT NULL,
                business_total INT NOT NULL,
                business_price_amount BIGINT NOT NULL,
                business_price_currency CHAR(3) NOT NULL,
                first_available INT NOT NULL,
                first_total INT NOT NULL,
                first_price_amount BIGINT NOT NULL,
                first_price_currency CHAR(3) NOT NULL,
                version BIGINT NOT NULL DEFAULT 0
            )",
            "CREATE TABLE IF NOT EXISTS bookings (
                id BINARY(16) NOT NULL PRIMARY KEY,
                pnr_code CHAR(6) NOT NULL,
                status ENUM('HELD', 'CONFIRMED', 'TICKETED', 'CANCELLED', 'EXPIRED') NOT NULL,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                expires_at DATETIME(6) NULL,
                version BIGINT NOT NULL DEFAULT 0,
                CONSTRAINT bookings_pnr_code_uindex UNIQUE (pnr_code)
            )",
            "CREATE TABLE IF NOT EXISTS passengers (
                id BINARY(16) NOT NULL PRIMARY KEY,
                booking_id BINARY(16) NOT NULL,
                first_name CHAR(255) NOT NULL,
                last_name CHAR(255) NOT NULL,
                email CHAR(255) NOT NULL,
                date_of_birth DATE NOT NULL,
                gender ENUM('MALE', 'FEMALE', 'OTHER') NOT NULL,
                passenger_type ENUM('ADULT', 'CHILD', 'SENIOR', 'INFANT') NOT NULL,
                CONSTRAINT passengers_bookings_id_fk
                    FOREIGN KEY (booking_id) REFERENCES bookings(id)
                    ON DELETE CASCADE
            )",
            "CREATE TABLE IF NOT EXISTS segments (
                id BINARY(16) NOT NULL PRIMARY KEY,
                booking_id BINARY(16) NOT NULL,
                flight_id VARCHAR(32) NOT NULL,
                cabin_class ENUM('ECONOMY', 'BUSINESS', 'FIRST') NOT NULL,
                price_amount BIGINT NOT NULL,
                price_currency CHAR(3) NOT NULL,
                seat_number CHAR(4) NULL,
                CONSTRAINT segments_bookings_id_fk
                    FOREIGN KEY (booking_id) REFERENCES bookings(id)
                    ON DELETE CASCADE,
                CONSTRAINT segments_flight_inventory_flight_id_fk
                    FOREIGN KEY (flight_id) REFERENCES flight_inventory(flight_id)
            )",
            "CREATE TABLE IF NOT EXISTS tickets (
                ticket_number CHAR(13) NOT NULL PRIMARY KEY,
                pnr_code CHAR(6) NOT NULL,
                status ENUM('ISSUED', 'REFUNDED', 'VOIDED', 'EXCHANGED') NOT NULL,
                passenger_id BINARY(16) NOT NULL,
                passenger_name CHAR(255) NOT NULL,
                coupons JSON NOT NULL,
                issued_at DATETIME(6) NOT NULL,
                CONSTRAINT tickets_passengers_id_fk
                    FOREIGN KEY (passenger_id) REFERENCES passengers(id)
            )",
            "CREATE TABLE IF NOT EXISTS event_outbox (
                id BINARY(16) NOT NULL PRIMARY KEY,
                event_type CHAR(64) NOT NULL,
                aggregate_id CHAR(64) NOT NULL,
                payload JSON NOT NULL,
                created_at DATETIME(6) NOT NULL,
                processing_at DATETIME(6) NULL,
                published_at DATETIME(6) NULL,
                retry_count INT NOT NULL DEFAULT 0,
                last_error TEXT NULL
            )",
        ];

        for create_sql in tables {
            sqlx::query(create_sql).execute(pool).await?;
        }

        Ok(())
    }

    async fn insert_initial_data(_pool: &Pool) -> Result<(), Error> {
        // No global test data needed
        Ok(())
    }

    //TODO: Maybe add more functions to help setup to create default test data

    // Teardown function to drop database after test run (not after each test)
    pub fn cleanup_database_sync() -> Result<(), Box<dyn std::error::Error>> {
        dotenv().ok();

        // Use .env file to get the admin database url
        let db_url = env::var("ADMIN_DATABASE_URL").expect("DATABASE_URL must be set in .env file");
        let url_parts: Vec<&str> = db_url.split("://").nth(1).unwrap().split("@").collect();
        let auth = url_parts[0].split(":").collect::<Vec<&str>>();
        let username = auth[0];
        let password = auth[1];

        // Get the database name and drop the database
        if let Some(db_name) = DB_NAME.get() {
            let output = std::process::Command::new("mysql")
                .arg("-u")
                .arg(username)
                .arg(format!("-p{}", password))
                .arg("-e")
                .arg(format!("DROP DATABASE IF EXISTS {};", db_name))
                .output()?;

            if !output.status.success() {
                return Err(format!(
                    "Failed to drop test database: {}",
                    String::from_utf8_lossy(&output.stderr)
                )
                .into());
            }
        }
        Ok(())
    }
}
