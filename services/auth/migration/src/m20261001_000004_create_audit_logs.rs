use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AuditLogs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(AuditLogs::UserId).uuid())
                    .col(ColumnDef::new(AuditLogs::Action).string_len(50).not_null())
                    .col(
                        ColumnDef::new(AuditLogs::Identifier)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuditLogs::IpAddress).string_len(64))
                    .col(ColumnDef::new(AuditLogs::UserAgent).text())
                    .col(ColumnDef::new(AuditLogs::Metadata).json_binary())
                    .col(ColumnDef::new(AuditLogs::Success).boolean().not_null())
                    .col(
                        ColumnDef::new(AuditLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(AuditLogs::Table, AuditLogs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(AuditLogs::Table)
                    .col(AuditLogs::UserId)
                    .col(AuditLogs::CreatedAt)
                    .name("idx_audit_logs_user_id_created_at")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(AuditLogs::Table)
                    .col(AuditLogs::Identifier)
                    .name("idx_audit_logs_identifier")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AuditLogs {
    Table,
    Id,
    UserId,
    Action,
    Identifier,
    IpAddress,
    UserAgent,
    Metadata,
    Success,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
