//! Migration to create the messages table.
//!
//! Stores every message ingested from a monitored queue exactly once, keyed by
//! the queue service's message identifier, and queryable by queue or topic.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Messages::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Messages::MessageId).string_len(255).not_null())
                    .col(ColumnDef::new(Messages::QueueName).string_len(255).not_null())
                    .col(ColumnDef::new(Messages::TopicArn).string_len(512).null())
                    .col(ColumnDef::new(Messages::Subject).text().null())
                    .col(ColumnDef::new(Messages::Body).text().not_null())
                    .col(ColumnDef::new(Messages::Attributes).json().null())
                    .col(
                        ColumnDef::new(Messages::State)
                            .string_len(50)
                            .not_null()
                            .default("RECEIVED"),
                    )
                    .col(
                        ColumnDef::new(Messages::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Dedup key: concurrent ingesters rely on this constraint, not on the pre-check
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_message_id_unique")
                    .table(Messages::Table)
                    .col(Messages::MessageId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_messages_queue_received ON messages (queue_name, received_at DESC)".to_string(),
            ))
            .await?;

        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_messages_topic_received ON messages (topic_arn, received_at DESC)".to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_messages_queue_received")
                    .table(Messages::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_messages_topic_received")
                    .table(Messages::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_messages_message_id_unique")
                    .table(Messages::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Messages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Messages {
    Table,
    Id,
    MessageId,
    QueueName,
    TopicArn,
    Subject,
    Body,
    Attributes,
    State,
    ReceivedAt,
}
