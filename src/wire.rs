use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;

use crate::auth::WaitqAuthSource;
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command};
use crate::tenant::TenantManager;
use crate::tls::TlsAcceptor;

pub struct WaitqHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<WaitqQueryParser>,
}

impl WaitqHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(WaitqQueryParser),
        }
    }

    /// The connection's database name is the tenant. Every engine call on
    /// this connection is scoped to that tenant's state.
    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    async fn execute_command(
        &self,
        engine: &Engine,
        cmd: Command,
    ) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let start = std::time::Instant::now();
        let result = self.dispatch(engine, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn dispatch(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertStaff { id, name, service_type, daily_capacity, available } => {
                engine
                    .create_staff(id, name, service_type, daily_capacity, available)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateStaff { id, name, service_type, daily_capacity, available } => {
                engine
                    .update_staff(id, name, service_type, daily_capacity, available)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteStaff { id } => {
                engine.delete_staff(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::SelectStaff => {
                let schema = Arc::new(staff_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .list_staff()
                    .into_iter()
                    .map(|s| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&s.id.to_string())?;
                        encoder.encode_field(&s.name)?;
                        encoder.encode_field(&s.service_type)?;
                        encoder.encode_field(&(s.daily_capacity as i32))?;
                        encoder.encode_field(&availability_str(s.available))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::InsertService { id, name, duration_min, required_staff_type } => {
                engine
                    .create_service(id, name, duration_min, required_staff_type)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteService { id } => {
                engine.delete_service(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::SelectServices => {
                let schema = Arc::new(services_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .list_services()
                    .into_iter()
                    .map(|s| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&s.id.to_string())?;
                        encoder.encode_field(&s.name)?;
                        encoder.encode_field(&(s.duration_min as i32))?;
                        encoder.encode_field(&s.required_staff_type)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::InsertAppointment { id, customer_name, service_id, staff_id, at } => {
                let appt = engine
                    .create_appointment(id, customer_name, service_id, staff_id, at)
                    .await
                    .map_err(engine_err)?;
                // Echo the booking back: the caller needs to see a silent
                // downgrade to the queue.
                let schema = Arc::new(appointments_schema());
                let row = encode_appointment(&schema, &appt);
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(vec![row]),
                ))])
            }
            Command::UpdateAppointment { id, status, staff_id, at } => {
                engine
                    .update_appointment(id, status, staff_id, at)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteAppointment { id } => {
                engine.delete_appointment(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::PurgeAppointment { id } => {
                engine.purge_appointment(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::SelectAppointments { staff_id, day_of } => {
                let schema = Arc::new(appointments_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .list_appointments(staff_id, day_of)
                    .iter()
                    .map(|a| encode_appointment(&schema, a))
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectQueue => {
                let schema = Arc::new(queue_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .queue()
                    .into_iter()
                    .map(|item| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&(item.position as i32))?;
                        encoder.encode_field(&item.appointment.id.to_string())?;
                        encoder.encode_field(&item.appointment.customer_name)?;
                        encoder.encode_field(&item.appointment.service_id.to_string())?;
                        encoder.encode_field(&item.appointment.at)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectActivity { action, limit } => {
                let schema = Arc::new(activity_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .list_activity(action, limit)
                    .into_iter()
                    .map(|v| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&v.entry.id.to_string())?;
                        encoder.encode_field(&v.entry.appointment_id.to_string())?;
                        encoder.encode_field(&v.customer_name)?;
                        encoder.encode_field(&v.entry.action.as_str())?;
                        encoder.encode_field(&v.entry.description)?;
                        encoder.encode_field(&v.entry.at)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::Promote { staff_id } => {
                let outcome = engine.promote_from_queue(staff_id).await.map_err(engine_err)?;
                if outcome.assigned {
                    metrics::counter!(observability::QUEUE_PROMOTIONS_TOTAL).increment(1);
                }
                let schema = Arc::new(promote_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&outcome.assigned)?;
                encoder.encode_field(&outcome.appointment.as_ref().map(|a| a.id.to_string()))?;
                encoder.encode_field(
                    &outcome
                        .appointment
                        .as_ref()
                        .and_then(|a| a.staff_id)
                        .map(|s| s.to_string()),
                )?;
                encoder.encode_field(&outcome.message)?;
                let row = Ok(encoder.take_row());
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(vec![row]),
                ))])
            }
        }
    }
}

fn availability_str(available: bool) -> &'static str {
    if available { "available" } else { "on_leave" }
}

fn encode_appointment(
    schema: &Arc<Vec<FieldInfo>>,
    a: &Appointment,
) -> PgWireResult<pgwire::messages::data::DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&a.id.to_string())?;
    encoder.encode_field(&a.customer_name)?;
    encoder.encode_field(&a.service_id.to_string())?;
    encoder.encode_field(&a.staff_id.map(|s| s.to_string()))?;
    encoder.encode_field(&a.at)?;
    encoder.encode_field(&a.status.as_str())?;
    Ok(encoder.take_row())
}

// ── Result schemas ───────────────────────────────────────────────

fn text_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn int4_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::INT4, FieldFormat::Text)
}

fn int8_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::INT8, FieldFormat::Text)
}

fn staff_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("name"),
        text_field("service_type"),
        int4_field("daily_capacity"),
        text_field("availability"),
    ]
}

fn services_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("name"),
        int4_field("duration"),
        text_field("required_staff_type"),
    ]
}

fn appointments_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("customer_name"),
        text_field("service_id"),
        text_field("staff_id"),
        int8_field("at"),
        text_field("status"),
    ]
}

fn queue_schema() -> Vec<FieldInfo> {
    vec![
        int4_field("position"),
        text_field("id"),
        text_field("customer_name"),
        text_field("service_id"),
        int8_field("at"),
    ]
}

fn activity_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("appointment_id"),
        text_field("customer_name"),
        text_field("action"),
        text_field("description"),
        int8_field("at"),
    ]
}

fn promote_schema() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new("assigned".into(), None, None, Type::BOOL, FieldFormat::Text),
        text_field("appointment_id"),
        text_field("staff_id"),
        text_field("message"),
    ]
}

/// Best-effort schema prediction for Describe. Keyed off the SQL text the
/// same way the statements are routed.
fn schema_for_sql(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    if upper.trim_start().starts_with("PROMOTE") {
        return promote_schema();
    }
    if upper.starts_with("INSERT") && upper.contains("APPOINTMENTS") {
        return appointments_schema();
    }
    if !upper.contains("SELECT") {
        return vec![];
    }
    if upper.contains("QUEUE") {
        queue_schema()
    } else if upper.contains("ACTIVITY") {
        activity_schema()
    } else if upper.contains("APPOINTMENTS") {
        appointments_schema()
    } else if upper.contains("SERVICES") {
        services_schema()
    } else if upper.contains("STAFF") {
        staff_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for WaitqHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_command(&engine, cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct WaitqQueryParser;

#[async_trait]
impl QueryParser for WaitqQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for_sql(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for WaitqHandler {
    type Statement = String;
    type QueryParser = WaitqQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.execute_command(&engine, cmd).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            schema_for_sql(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for_sql(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    if n > max {
                        max = n;
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct WaitqFactory {
    handler: Arc<WaitqHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<WaitqAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl WaitqFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = WaitqAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(WaitqHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for WaitqFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Drive one client connection through the wire protocol until it closes.
pub async fn process_connection(
    socket: tokio::net::TcpStream,
    factory: WaitqFactory,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: EngineError) -> PgWireError {
    let code = match &e {
        EngineError::Validation(_) => "22023",
        EngineError::NotFound(..) => "P0002",
        EngineError::AlreadyExists(_) => "23505",
        EngineError::Conflict(_) => "23P01",
        EngineError::LimitExceeded(_) => "54000",
        EngineError::Wal(detail) => {
            // Storage detail stays server-side.
            tracing::error!(error = %detail, "WAL write failed");
            return PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "XX000".into(),
                "internal storage error".into(),
            )));
        }
    };
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_params_finds_highest() {
        assert_eq!(count_params("SELECT * FROM queue"), 0);
        assert_eq!(count_params("INSERT INTO staff (id, name) VALUES ($1, $2)"), 2);
        assert_eq!(count_params("UPDATE appointments SET status = $2 WHERE id = $1"), 2);
    }

    #[test]
    fn schema_prediction_routes_by_table() {
        assert_eq!(schema_for_sql("SELECT * FROM queue").len(), 5);
        assert_eq!(schema_for_sql("SELECT * FROM activity LIMIT 5").len(), 6);
        assert_eq!(schema_for_sql("SELECT * FROM staff").len(), 5);
        assert_eq!(schema_for_sql("PROMOTE STAFF '01ARZ3NDEKTSV4RRFFQ69G5FAV'").len(), 4);
        assert_eq!(schema_for_sql("DELETE FROM staff WHERE id = '01ARZ3NDEKTSV4RRFFQ69G5FAV'").len(), 0);
    }
}
