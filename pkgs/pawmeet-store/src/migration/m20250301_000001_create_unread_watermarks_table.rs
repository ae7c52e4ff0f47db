use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum UnreadWatermarks {
    Table,
    ConversationId,
    ReadUpTo,
    UpdatedAt,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250301_000001_create_unread_watermarks_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UnreadWatermarks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UnreadWatermarks::ConversationId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UnreadWatermarks::ReadUpTo)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UnreadWatermarks::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UnreadWatermarks::Table).to_owned())
            .await
    }
}
