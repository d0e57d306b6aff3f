use crate::config::AppConfig;
use crate::context::Context;

pub struct GlobalState {
    pub config: AppConfig,
    pub db: sqlx::PgPool,
    pub ctx: Context,
}
