// connexion BD + schéma

use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::info;

use crate::models::{attendance, meal_confirmation, mess, subscription};

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);

    Database::connect(options).await
}

/// Crée les tables et les index uniques s'ils n'existent pas encore
pub async fn sync_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, mess::Entity).await?;
    create_table(db, &schema, subscription::Entity).await?;
    create_table(db, &schema, meal_confirmation::Entity).await?;
    create_table(db, &schema, attendance::Entity).await?;

    // Au plus UN passage valide par (user, jour, repas).
    // valid_slot vaut NULL pour les tentatives refusées => jamais en conflit.
    let attendance_slot = Index::create()
        .name("uq_attendance_valid_slot")
        .table(attendance::Entity)
        .col(attendance::Column::UserId)
        .col(attendance::Column::ScanDate)
        .col(attendance::Column::MealType)
        .col(attendance::Column::ValidSlot)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&attendance_slot)).await?;

    let confirmation_slot = Index::create()
        .name("uq_meal_confirmation_slot")
        .table(meal_confirmation::Entity)
        .col(meal_confirmation::Column::UserId)
        .col(meal_confirmation::Column::MessId)
        .col(meal_confirmation::Column::Date)
        .col(meal_confirmation::Column::MealType)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&confirmation_slot)).await?;

    let subscription_lookup = Index::create()
        .name("idx_subscription_user_mess")
        .table(subscription::Entity)
        .col(subscription::Column::UserId)
        .col(subscription::Column::MessId)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&subscription_lookup)).await?;

    info!("Schema synchronized");
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let statement = schema.create_table_from_entity(entity).if_not_exists().to_owned();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}
