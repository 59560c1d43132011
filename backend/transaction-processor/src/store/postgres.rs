use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{CardRecord, Identities, StoreError, StoreTransaction, TransactionStore, UserRecord};
use crate::guard::DedupKey;
use crate::models::{CanonicalTransaction, IngestionMetadata};

const TRANSACTION_COLUMNS: &str = r#"
    id, user_id, credit_card_id, amount, currency, description,
    merchant_name, merchant_category, transaction_date, transaction_type, status,
    merchant_location, merchant_city, merchant_state, merchant_country,
    authorization_code, reference_number,
    use_chip, zip_code, is_fraud, errors
"#;

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }
}

struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn find_duplicate(&mut self, key: &DedupKey) -> Result<Option<Uuid>, StoreError> {
        // Serializes concurrent redeliveries of the same record until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key.lock_name())
            .execute(&mut *self.tx)
            .await?;

        let row = sqlx::query(
            r#"
            SELECT id FROM transactions
            WHERE user_id = $1
              AND credit_card_id = $2
              AND amount = $3
              AND transaction_date = $4
            LIMIT 1
            "#,
        )
        .bind(&key.user_id)
        .bind(&key.card_id)
        .bind(key.amount)
        .bind(key.transaction_date)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(match row {
            Some(row) => Some(row.try_get::<Uuid, _>("id")?),
            None => None,
        })
    }

    async fn find_user_and_card(
        &mut self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Identities, StoreError> {
        let user = sqlx::query("SELECT id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(|row| -> Result<UserRecord, sqlx::Error> {
                Ok(UserRecord {
                    id: row.try_get("id")?,
                })
            })
            .transpose()?;

        let card = sqlx::query("SELECT id, user_id FROM credit_cards WHERE id = $1")
            .bind(card_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(|row| -> Result<CardRecord, sqlx::Error> {
                Ok(CardRecord {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                })
            })
            .transpose()?;

        Ok(Identities { user, card })
    }

    async fn insert_transaction(
        &mut self,
        record: &CanonicalTransaction,
    ) -> Result<CanonicalTransaction, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO transactions ({TRANSACTION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(record.id)
            .bind(&record.user_id)
            .bind(&record.credit_card_id)
            .bind(record.amount)
            .bind(&record.currency)
            .bind(&record.description)
            .bind(&record.merchant_name)
            .bind(&record.merchant_category)
            .bind(record.transaction_date)
            .bind(record.transaction_type.as_str())
            .bind(record.status.as_str())
            .bind(&record.merchant_location)
            .bind(&record.merchant_city)
            .bind(&record.merchant_state)
            .bind(&record.merchant_country)
            .bind(&record.authorization_code)
            .bind(&record.reference_number)
            .bind(&record.metadata.use_chip)
            .bind(&record.metadata.zip_code)
            .bind(record.metadata.is_fraud)
            .bind(&record.metadata.errors)
            .fetch_one(&mut *self.tx)
            .await?;

        debug!(transaction_id = %record.id, "Transaction row inserted");
        row_to_transaction(&row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn row_to_transaction(row: &PgRow) -> Result<CanonicalTransaction, StoreError> {
    let transaction_type: String = row.try_get("transaction_type")?;
    let status: String = row.try_get("status")?;

    Ok(CanonicalTransaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        credit_card_id: row.try_get("credit_card_id")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        description: row.try_get("description")?,
        merchant_name: row.try_get("merchant_name")?,
        merchant_category: row.try_get("merchant_category")?,
        transaction_date: row.try_get("transaction_date")?,
        transaction_type: transaction_type.parse().map_err(StoreError::Database)?,
        status: status.parse().map_err(StoreError::Database)?,
        merchant_location: row.try_get("merchant_location")?,
        merchant_city: row.try_get("merchant_city")?,
        merchant_state: row.try_get("merchant_state")?,
        merchant_country: row.try_get("merchant_country")?,
        authorization_code: row.try_get("authorization_code")?,
        reference_number: row.try_get("reference_number")?,
        metadata: IngestionMetadata {
            use_chip: row.try_get("use_chip")?,
            zip_code: row.try_get("zip_code")?,
            is_fraud: row.try_get("is_fraud")?,
            errors: row.try_get("errors")?,
        },
    })
}
