use sqlparser::ast::{self, Expr, FromTable, LimitClause, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertStaff {
        id: Ulid,
        name: String,
        service_type: String,
        daily_capacity: Option<u32>,
        available: Option<bool>,
    },
    UpdateStaff {
        id: Ulid,
        name: Option<String>,
        service_type: Option<String>,
        daily_capacity: Option<u32>,
        available: Option<bool>,
    },
    DeleteStaff {
        id: Ulid,
    },
    SelectStaff,
    InsertService {
        id: Ulid,
        name: String,
        duration_min: u32,
        required_staff_type: String,
    },
    DeleteService {
        id: Ulid,
    },
    SelectServices,
    InsertAppointment {
        id: Ulid,
        customer_name: String,
        service_id: Ulid,
        staff_id: Option<Ulid>,
        at: Ms,
    },
    UpdateAppointment {
        id: Ulid,
        status: Option<AppointmentStatus>,
        /// Outer None = field untouched, inner None = unassign.
        staff_id: Option<Option<Ulid>>,
        at: Option<Ms>,
    },
    DeleteAppointment {
        id: Ulid,
    },
    /// `DELETE FROM archive WHERE id = ...` — terminal removal, no audit.
    PurgeAppointment {
        id: Ulid,
    },
    SelectAppointments {
        staff_id: Option<Ulid>,
        day_of: Option<Ms>,
    },
    SelectQueue,
    SelectActivity {
        action: Option<ActivityAction>,
        limit: Option<usize>,
    },
    Promote {
        staff_id: Option<Ulid>,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim();
    if trimmed.to_uppercase().starts_with("PROMOTE") {
        return parse_promote(trimmed);
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update { table, assignments, selection, .. } => {
            parse_update(table, assignments, selection)
        }
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// `PROMOTE` or `PROMOTE STAFF '<ulid>'` — not SQL, so handled before the
/// parser, the way LISTEN-style verbs usually are.
fn parse_promote(input: &str) -> Result<Command, SqlError> {
    let rest = input[7..].trim().trim_end_matches(';').trim();
    if rest.is_empty() {
        return Ok(Command::Promote { staff_id: None });
    }
    let upper = rest.to_uppercase();
    if let Some(stripped) = upper.strip_prefix("STAFF") {
        let raw = rest[rest.len() - stripped.len()..].trim().trim_matches('\'');
        let id = Ulid::from_string(raw).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))?;
        return Ok(Command::Promote { staff_id: Some(id) });
    }
    Err(SqlError::Parse(format!("bad PROMOTE argument: {rest}")))
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;

    match table.as_str() {
        "staff" => {
            if values.len() < 3 {
                return Err(SqlError::WrongArity("staff", 3, values.len()));
            }
            let daily_capacity = if values.len() >= 4 {
                parse_u32_or_null(&values[3])?
            } else {
                None
            };
            let available = if values.len() >= 5 {
                parse_availability_or_null(&values[4])?
            } else {
                None
            };
            Ok(Command::InsertStaff {
                id: parse_ulid(&values[0])?,
                name: parse_string(&values[1])?,
                service_type: parse_string(&values[2])?,
                daily_capacity,
                available,
            })
        }
        "services" => {
            if values.len() < 4 {
                return Err(SqlError::WrongArity("services", 4, values.len()));
            }
            Ok(Command::InsertService {
                id: parse_ulid(&values[0])?,
                name: parse_string(&values[1])?,
                duration_min: parse_u32(&values[2])?,
                required_staff_type: parse_string(&values[3])?,
            })
        }
        "appointments" => {
            if values.len() < 5 {
                return Err(SqlError::WrongArity("appointments", 5, values.len()));
            }
            Ok(Command::InsertAppointment {
                id: parse_ulid(&values[0])?,
                customer_name: parse_string(&values[1])?,
                service_id: parse_ulid(&values[2])?,
                staff_id: parse_ulid_or_null(&values[3])?,
                at: parse_i64(&values[4])?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    let id = extract_where_id(selection)?;

    match table.as_str() {
        "staff" => {
            let (mut name, mut service_type, mut daily_capacity, mut available) =
                (None, None, None, None);
            for a in assignments {
                match assignment_column(a)?.as_str() {
                    "name" => name = Some(parse_string(&a.value)?),
                    "service_type" => service_type = Some(parse_string(&a.value)?),
                    "daily_capacity" => daily_capacity = Some(parse_u32(&a.value)?),
                    "availability" => available = Some(parse_availability(&a.value)?),
                    col => return Err(SqlError::UnknownColumn(col.to_string())),
                }
            }
            Ok(Command::UpdateStaff { id, name, service_type, daily_capacity, available })
        }
        "appointments" => {
            let (mut status, mut staff_id, mut at) = (None, None, None);
            for a in assignments {
                match assignment_column(a)?.as_str() {
                    "status" => status = Some(parse_status(&a.value)?),
                    "staff_id" => staff_id = Some(parse_ulid_or_null(&a.value)?),
                    "at" => at = Some(parse_i64(&a.value)?),
                    col => return Err(SqlError::UnknownColumn(col.to_string())),
                }
            }
            Ok(Command::UpdateAppointment { id, status, staff_id, at })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "staff" => Ok(Command::DeleteStaff { id }),
        "services" => Ok(Command::DeleteService { id }),
        "appointments" => Ok(Command::DeleteAppointment { id }),
        "archive" => Ok(Command::PurgeAppointment { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    match table.as_str() {
        "staff" => Ok(Command::SelectStaff),
        "services" => Ok(Command::SelectServices),
        "appointments" => {
            let (mut staff_id, mut day_of) = (None, None);
            if let Some(selection) = &select.selection {
                extract_appointment_filters(selection, &mut staff_id, &mut day_of)?;
            }
            Ok(Command::SelectAppointments { staff_id, day_of })
        }
        "queue" => Ok(Command::SelectQueue),
        "activity" | "activity_logs" => {
            let mut action = None;
            if let Some(selection) = &select.selection {
                extract_activity_filters(selection, &mut action)?;
            }
            Ok(Command::SelectActivity {
                action,
                limit: extract_limit(query)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn extract_appointment_filters(
    expr: &Expr,
    staff_id: &mut Option<Ulid>,
    day_of: &mut Option<Ms>,
) -> Result<(), SqlError> {
    if let Expr::BinaryOp { left, op, right } = expr {
        match op {
            ast::BinaryOperator::And => {
                extract_appointment_filters(left, staff_id, day_of)?;
                extract_appointment_filters(right, staff_id, day_of)?;
            }
            ast::BinaryOperator::Eq => {
                let col = expr_column_name(left);
                if col.as_deref() == Some("staff_id") {
                    *staff_id = Some(parse_ulid(right)?);
                } else if col.as_deref() == Some("day_of") {
                    *day_of = Some(parse_i64(right)?);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn extract_activity_filters(expr: &Expr, action: &mut Option<ActivityAction>) -> Result<(), SqlError> {
    if let Expr::BinaryOp { left, op: ast::BinaryOperator::Eq, right } = expr
        && expr_column_name(left).as_deref() == Some("action")
    {
        *action = Some(parse_action(right)?);
    }
    Ok(())
}

fn extract_limit(query: &ast::Query) -> Result<Option<usize>, SqlError> {
    let Some(LimitClause::LimitOffset { limit: Some(expr), .. }) = &query.limit_clause else {
        return Ok(None);
    };
    let n = parse_i64(expr)?;
    usize::try_from(n)
        .map(Some)
        .map_err(|_| SqlError::Parse(format!("bad LIMIT: {n}")))
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn assignment_column(a: &ast::Assignment) -> Result<String, SqlError> {
    match &a.target {
        ast::AssignmentTarget::ColumnName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))
        }
        _ => Err(SqlError::Parse("unsupported assignment target".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows[0].clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if expr_column_name(left).as_deref() == Some("id") {
                parse_ulid(right)
            } else {
                Err(SqlError::MissingFilter("id"))
            }
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Null => Ok(None),
            Value::SingleQuotedString(s) | Value::Number(s, _) => Ok(Some(
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))?,
            )),
            _ => Err(SqlError::Parse(format!(
                "expected string or NULL, got {value:?}"
            ))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) => Ok(s.clone()),
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_u32_or_null(expr: &Expr) -> Result<Option<u32>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => Ok(Some(parse_u32(expr)?)),
    }
}

fn parse_status(expr: &Expr) -> Result<AppointmentStatus, SqlError> {
    let s = parse_string(expr)?;
    AppointmentStatus::parse(&s).ok_or_else(|| SqlError::Parse(format!("bad status: {s}")))
}

fn parse_action(expr: &Expr) -> Result<ActivityAction, SqlError> {
    let s = parse_string(expr)?;
    ActivityAction::parse(&s).ok_or_else(|| SqlError::Parse(format!("bad action: {s}")))
}

fn parse_availability(expr: &Expr) -> Result<bool, SqlError> {
    if let Some(Value::Boolean(b)) = extract_value(expr) {
        return Ok(*b);
    }
    match parse_string(expr)?.as_str() {
        "available" => Ok(true),
        "on_leave" => Ok(false),
        s => Err(SqlError::Parse(format!("bad availability: {s}"))),
    }
}

fn parse_availability_or_null(expr: &Expr) -> Result<Option<bool>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => Ok(Some(parse_availability(expr)?)),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    #[test]
    fn parse_insert_staff_minimal() {
        let sql = format!("INSERT INTO staff (id, name, service_type) VALUES ('{ID}', 'Dr. Riya Sharma', 'Doctor')");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::InsertStaff { id, name, service_type, daily_capacity, available } => {
                assert_eq!(id.to_string(), ID);
                assert_eq!(name, "Dr. Riya Sharma");
                assert_eq!(service_type, "Doctor");
                assert_eq!(daily_capacity, None);
                assert_eq!(available, None);
            }
            _ => panic!("expected InsertStaff, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_staff_full() {
        let sql = format!("INSERT INTO staff (id, name, service_type, daily_capacity, availability) VALUES ('{ID}', 'Mike Chen', 'Support Agent', 10, 'on_leave')");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::InsertStaff { daily_capacity, available, .. } => {
                assert_eq!(daily_capacity, Some(10));
                assert_eq!(available, Some(false));
            }
            _ => panic!("expected InsertStaff, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_staff() {
        let sql = format!("UPDATE staff SET daily_capacity = 8, availability = 'available' WHERE id = '{ID}'");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::UpdateStaff { id, name, service_type, daily_capacity, available } => {
                assert_eq!(id.to_string(), ID);
                assert_eq!(name, None);
                assert_eq!(service_type, None);
                assert_eq!(daily_capacity, Some(8));
                assert_eq!(available, Some(true));
            }
            _ => panic!("expected UpdateStaff, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_staff_unknown_column_errors() {
        let sql = format!("UPDATE staff SET phone = '555' WHERE id = '{ID}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownColumn(_))));
    }

    #[test]
    fn parse_insert_service() {
        let sql = format!("INSERT INTO services (id, name, duration, required_staff_type) VALUES ('{ID}', 'General Checkup', 30, 'Doctor')");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::InsertService { name, duration_min, required_staff_type, .. } => {
                assert_eq!(name, "General Checkup");
                assert_eq!(duration_min, 30);
                assert_eq!(required_staff_type, "Doctor");
            }
            _ => panic!("expected InsertService, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_appointment() {
        let sql = format!("INSERT INTO appointments (id, customer_name, service_id, staff_id, at) VALUES ('{ID}', 'Farhan Ahmed', '{ID}', '{ID}', 1700000000000)");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::InsertAppointment { customer_name, staff_id, at, .. } => {
                assert_eq!(customer_name, "Farhan Ahmed");
                assert!(staff_id.is_some());
                assert_eq!(at, 1700000000000);
            }
            _ => panic!("expected InsertAppointment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_appointment_without_staff() {
        let sql = format!("INSERT INTO appointments (id, customer_name, service_id, staff_id, at) VALUES ('{ID}', 'Sarah Johnson', '{ID}', NULL, 1700000000000)");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::InsertAppointment { staff_id, .. } => assert_eq!(staff_id, None),
            _ => panic!("expected InsertAppointment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_appointment_status() {
        let sql = format!("UPDATE appointments SET status = 'completed' WHERE id = '{ID}'");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::UpdateAppointment { status, staff_id, at, .. } => {
                assert_eq!(status, Some(AppointmentStatus::Completed));
                assert_eq!(staff_id, None);
                assert_eq!(at, None);
            }
            _ => panic!("expected UpdateAppointment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_appointment_unassign() {
        let sql = format!("UPDATE appointments SET staff_id = NULL, status = 'waiting' WHERE id = '{ID}'");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::UpdateAppointment { staff_id, status, .. } => {
                assert_eq!(staff_id, Some(None));
                assert_eq!(status, Some(AppointmentStatus::Waiting));
            }
            _ => panic!("expected UpdateAppointment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_bad_status_errors() {
        let sql = format!("UPDATE appointments SET status = 'pending' WHERE id = '{ID}'");
        assert!(parse_sql(&sql).is_err());
    }

    #[test]
    fn parse_delete_appointment() {
        let sql = format!("DELETE FROM appointments WHERE id = '{ID}'");
        assert!(matches!(parse_sql(&sql).unwrap(), Command::DeleteAppointment { .. }));
    }

    #[test]
    fn parse_delete_archive_is_purge() {
        let sql = format!("DELETE FROM archive WHERE id = '{ID}'");
        assert!(matches!(parse_sql(&sql).unwrap(), Command::PurgeAppointment { .. }));
    }

    #[test]
    fn parse_delete_without_where_errors() {
        assert!(matches!(
            parse_sql("DELETE FROM appointments"),
            Err(SqlError::MissingFilter("id"))
        ));
    }

    #[test]
    fn parse_select_staff_and_services() {
        assert_eq!(parse_sql("SELECT * FROM staff").unwrap(), Command::SelectStaff);
        assert_eq!(parse_sql("SELECT * FROM services").unwrap(), Command::SelectServices);
    }

    #[test]
    fn parse_select_appointments_unfiltered() {
        let cmd = parse_sql("SELECT * FROM appointments").unwrap();
        assert_eq!(cmd, Command::SelectAppointments { staff_id: None, day_of: None });
    }

    #[test]
    fn parse_select_appointments_filtered() {
        let sql = format!("SELECT * FROM appointments WHERE staff_id = '{ID}' AND day_of = 1700000000000");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::SelectAppointments { staff_id, day_of } => {
                assert_eq!(staff_id.unwrap().to_string(), ID);
                assert_eq!(day_of, Some(1700000000000));
            }
            _ => panic!("expected SelectAppointments, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_queue() {
        assert_eq!(parse_sql("SELECT * FROM queue").unwrap(), Command::SelectQueue);
    }

    #[test]
    fn parse_select_activity_defaults() {
        let cmd = parse_sql("SELECT * FROM activity").unwrap();
        assert_eq!(cmd, Command::SelectActivity { action: None, limit: None });
    }

    #[test]
    fn parse_select_activity_filtered_with_limit() {
        let cmd = parse_sql("SELECT * FROM activity WHERE action = 'cancelled' LIMIT 25").unwrap();
        assert_eq!(
            cmd,
            Command::SelectActivity {
                action: Some(ActivityAction::Cancelled),
                limit: Some(25),
            }
        );
    }

    #[test]
    fn parse_select_activity_logs_alias() {
        let cmd = parse_sql("SELECT * FROM activity_logs LIMIT 5").unwrap();
        assert_eq!(cmd, Command::SelectActivity { action: None, limit: Some(5) });
    }

    #[test]
    fn parse_promote_bare() {
        assert_eq!(parse_sql("PROMOTE").unwrap(), Command::Promote { staff_id: None });
        assert_eq!(parse_sql("promote;").unwrap(), Command::Promote { staff_id: None });
    }

    #[test]
    fn parse_promote_with_staff() {
        let cmd = parse_sql(&format!("PROMOTE STAFF '{ID}'")).unwrap();
        match cmd {
            Command::Promote { staff_id } => assert_eq!(staff_id.unwrap().to_string(), ID),
            _ => panic!("expected Promote, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_promote_garbage_errors() {
        assert!(parse_sql("PROMOTE EVERYTHING").is_err());
    }

    #[test]
    fn parse_unknown_table_errors() {
        let sql = format!("INSERT INTO foobar (id) VALUES ('{ID}')");
        assert!(parse_sql(&sql).is_err());
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
