//! ServerContext - タスクに明示的に渡すサーバー側の依存
//!
//! グローバルなレジストリの代わりにこれを渡すことで、テストでは fake を差し込めます。

use std::sync::Arc;

use parking_lot::RwLock;

use crate::impls::{DisabledMailTransport, StaticSchema};
use crate::ports::{
    AttributeType, Clock, IdGenerator, MailTransport, SchemaProvider, SystemClock, UlidGenerator,
};

#[derive(Clone)]
pub struct ServerContext {
    schema: Arc<RwLock<Option<Arc<dyn SchemaProvider>>>>,
    clock: Arc<dyn Clock>,
    mail: Arc<dyn MailTransport>,
    ids: Arc<dyn IdGenerator>,
}

impl ServerContext {
    pub fn new(
        schema: Option<Arc<dyn SchemaProvider>>,
        clock: Arc<dyn Clock>,
        mail: Arc<dyn MailTransport>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            schema: Arc::new(RwLock::new(schema)),
            clock,
            mail,
            ids,
        }
    }

    /// 開発用のデフォルト: タスク schema あり、システム時刻、メール未設定
    pub fn with_defaults() -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::new(
            Some(Arc::new(StaticSchema::task_schema())),
            Arc::clone(&clock),
            Arc::new(DisabledMailTransport),
            Arc::new(UlidGenerator::new(clock)),
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    pub fn with_mail(mut self, mail: Arc<dyn MailTransport>) -> Self {
        self.mail = mail;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// schema を差し替える（`None` は再起動中など schema が無い状態）
    pub fn set_schema(&self, schema: Option<Arc<dyn SchemaProvider>>) {
        *self.schema.write() = schema;
    }

    /// attribute type を解決する。schema が無ければ `None`
    pub fn resolve_attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.schema.read().as_ref()?.attribute_type(name)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn mail(&self) -> &Arc<dyn MailTransport> {
        &self.mail
    }

    pub fn ids(&self) -> &Arc<dyn IdGenerator> {
        &self.ids
    }
}
