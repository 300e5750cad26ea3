use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table_name = Alias::new("linked");

        // One row per (discord user, site); tokens are the Discord pair from hop 1
        manager
            .create_table(
                Table::create()
                    .table(table_name.clone())
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("discord_user")).text().not_null())
                    .col(ColumnDef::new(Alias::new("wiki_userid")).text().not_null())
                    .col(ColumnDef::new(Alias::new("wiki_username")).text().not_null())
                    .col(ColumnDef::new(Alias::new("site")).text().not_null())
                    .col(ColumnDef::new(Alias::new("access_token")).text().not_null())
                    .col(ColumnDef::new(Alias::new("refresh_token")).text().not_null())
                    .to_owned(),
            )
            .await?;

        // ON CONFLICT target of the upsert
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_linked_discord_user_site")
                    .table(table_name)
                    .col(Alias::new("discord_user"))
                    .col(Alias::new("site"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("linked")).to_owned())
            .await?;

        Ok(())
    }
}
