//! Schema-definition parser
//!
//! Turns the definition block for one table into a [`TableSchema`]. The text is
//! tokenized line by line (see [`crate::schema::lexer`]) and each chained call
//! is interpreted against a [`ParseContext`]. Lines that are not understood are
//! reported as unparsed and otherwise ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::schema::lexer::{self, Arg, Call, ChainCall, Line};
use crate::schema::type_map::{
    definition_keyword, DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE, DEFAULT_STRING_LENGTH,
};
use crate::schema::types::{
    AbstractType, ColumnDescriptor, DefaultValue, ForeignKeyDescriptor, IndexDescriptor, IndexKind,
    ReferentialAction, TableSchema, TypeParams,
};
use crate::utils::naming;

static CREATE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"create\s*\(\s*['"]([A-Za-z0-9_]+)['"]"#).expect("valid regex"));

static CURRENT_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(current_timestamp|now|localtimestamp|localtime)\s*(\(\s*\d*\s*\))?\s*$")
        .expect("valid regex")
});

/// Whether a default expression is one of the current-timestamp spellings
pub fn is_current_timestamp(expression: &str) -> bool {
    CURRENT_TIMESTAMP.is_match(expression)
}

/// The bounded definition block of a table
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionBlock<'a> {
    /// Table name from the `create('<table>'` marker, when present
    pub table: Option<String>,
    pub body: &'a str,
}

/// Locate the definition block in raw text
///
/// The block is the body of the brace pair following a `create('<table>'`
/// marker, else the first brace pair, else the whole text.
pub fn extract_block(text: &str) -> Option<DefinitionBlock<'_>> {
    let (table, search_from) = match CREATE_MARKER.captures(text) {
        Some(captures) => {
            let whole = captures.get(0)?;
            (captures.get(1).map(|m| m.as_str().to_string()), whole.end())
        }
        None => (None, 0),
    };

    let open = match open_brace(text, search_from) {
        Some(open) => open,
        None if table.is_none() => return Some(DefinitionBlock { table, body: text }),
        None => return None,
    };

    let close = matching_brace(text, open)?;
    Some(DefinitionBlock {
        table,
        body: &text[open + 1..close],
    })
}

/// First `{` at or after `from` that is not inside a quoted string
fn open_brace(text: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[from..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '{' => return Some(from + offset),
            _ => {}
        }
    }
    None
}

fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// A line that was skipped
#[derive(Debug, Clone, PartialEq)]
pub struct UnparsedLine {
    pub number: usize,
    pub text: String,
}

/// Parser output
#[derive(Debug, Clone)]
pub struct ParsedDefinition {
    pub schema: TableSchema,
    pub unparsed: Vec<UnparsedLine>,
}

/// Interpretation state for one table
#[derive(Debug)]
pub struct ParseContext {
    table: TableSchema,
    index_signatures: HashSet<(IndexKind, Vec<String>)>,
    unparsed: Vec<UnparsedLine>,
}

impl ParseContext {
    pub fn new(table: &str) -> Self {
        Self {
            table: TableSchema::new(table),
            index_signatures: HashSet::new(),
            unparsed: Vec::new(),
        }
    }

    pub fn finish(self) -> ParsedDefinition {
        ParsedDefinition {
            schema: self.table,
            unparsed: self.unparsed,
        }
    }

    /// Add an index unless one with the same kind and column set exists
    fn add_index(&mut self, kind: IndexKind, columns: Vec<String>, name: Option<String>) {
        let index = IndexDescriptor::new(
            &name.unwrap_or_else(|| naming::generate_index_name(kind, &columns)),
            kind,
            columns,
        );
        if self.index_signatures.insert(index.signature()) {
            self.table.indexes.push(index);
        } else {
            tracing::debug!(table = %self.table.name, index = %index.name, "Duplicate index declaration collapsed");
        }
    }

    fn add_foreign_key(&mut self, fk: ForeignKeyDescriptor) {
        self.table.foreign_keys.retain(|existing| existing.column != fk.column);
        self.table.foreign_keys.push(fk);
    }

    fn skip(&mut self, number: usize, text: String) {
        tracing::debug!(table = %self.table.name, line = number, text = %text, "Skipping unrecognized definition line");
        self.unparsed.push(UnparsedLine { number, text });
    }
}

/// Parse raw definition text, locating the block first
///
/// `table_hint` names the table when the text carries no `create(...)` marker.
pub fn parse_definition(table_hint: &str, text: &str) -> Result<ParsedDefinition> {
    let block = extract_block(text)
        .ok_or_else(|| Error::parse(table_hint, "definition block not found"))?;
    let table = block.table.unwrap_or_else(|| table_hint.to_string());

    let lines = lexer::parse_lines(block.body);
    if lines.is_empty() {
        return Err(Error::parse(&table, "definition block is empty"));
    }

    let mut context = ParseContext::new(&table);
    let mut recognized = 0usize;
    for line in lines {
        match line {
            Line::Statement { number, call } => {
                if interpret(&mut context, &call) {
                    recognized += 1;
                } else {
                    context.skip(number, format!("{}(...)", call.construct));
                }
            }
            Line::Unparsed { number, text } => context.skip(number, text),
        }
    }

    if recognized == 0 {
        return Err(Error::parse(&table, "definition block has no recognized statements"));
    }

    Ok(context.finish())
}

/// Parse a block body for a known table
pub fn parse_table(table: &str, body: &str) -> Result<TableSchema> {
    parse_definition(table, body).map(|parsed| parsed.schema)
}

/// Interpret one chained call; `false` when the construct is not recognized
fn interpret(context: &mut ParseContext, call: &ChainCall) -> bool {
    match call.construct.as_str() {
        "timestamps" | "timestampsTz" | "nullableTimestamps" => {
            let params = fraction_param(call.positional_args.first());
            for name in ["created_at", "updated_at"] {
                context.table.add_column(
                    ColumnDescriptor::new(name, AbstractType::Timestamp)
                        .params(params.clone())
                        .nullable(true),
                );
            }
            context.table.has_timestamps = true;
            true
        }
        "softDeletes" | "softDeletesTz" => {
            let name = call.name.as_deref().unwrap_or("deleted_at");
            let params = fraction_param(call.positional_args.first());
            context.table.add_column(
                ColumnDescriptor::new(name, AbstractType::Timestamp)
                    .params(params)
                    .nullable(true),
            );
            context.table.has_soft_deletes = true;
            context.table.soft_deletes_column = Some(name.to_string());
            true
        }
        "rememberToken" => {
            context.table.add_column(
                ColumnDescriptor::new("remember_token", AbstractType::String)
                    .params(TypeParams::Length(100))
                    .nullable(true),
            );
            true
        }
        "index" | "unique" | "spatialIndex" => interpret_index(context, call),
        "primary" => {
            let columns = match (&call.name, call.positional_args.first()) {
                (Some(name), _) => vec![name.clone()],
                (None, Some(arg)) => arg.as_string_list().unwrap_or_default(),
                (None, None) => Vec::new(),
            };
            for column in context.table.columns.iter_mut() {
                if columns.contains(&column.name) {
                    column.primary_key = true;
                }
            }
            !columns.is_empty()
        }
        "foreign" => interpret_foreign(context, call),
        _ => interpret_column(context, call),
    }
}

fn fraction_param(arg: Option<&Arg>) -> TypeParams {
    match arg.and_then(Arg::as_u32) {
        Some(fraction) if fraction > 0 => TypeParams::Length(fraction),
        _ => TypeParams::None,
    }
}

fn interpret_index(context: &mut ParseContext, call: &ChainCall) -> bool {
    let kind = match call.construct.as_str() {
        "unique" => IndexKind::Unique,
        "spatialIndex" => IndexKind::Spatial,
        _ => IndexKind::Normal,
    };

    // `unique('email')` arrives with the column as the name
    let (columns, name_arg) = match &call.name {
        Some(column) => (Some(vec![column.clone()]), call.positional_args.first()),
        None => (
            call.positional_args.first().and_then(Arg::as_string_list),
            call.positional_args.get(1),
        ),
    };

    match columns {
        Some(columns) if !columns.is_empty() => {
            let name = name_arg.and_then(Arg::as_str).map(str::to_string);
            context.add_index(kind, columns, name);
            true
        }
        _ => false,
    }
}

fn interpret_foreign(context: &mut ParseContext, call: &ChainCall) -> bool {
    let Some(column) = call.name.clone() else {
        return false;
    };
    let name = call.positional_args.first().and_then(Arg::as_str).map(str::to_string);

    match build_foreign_key(&context.table.name, &column, name, &call.modifiers, false) {
        Some(fk) => {
            context.add_foreign_key(fk);
            true
        }
        None => false,
    }
}

/// Assemble a foreign key from `references`/`on`/`constrained` style modifiers
fn build_foreign_key(
    table: &str,
    column: &str,
    name: Option<String>,
    modifiers: &[Call],
    implicit: bool,
) -> Option<ForeignKeyDescriptor> {
    let mut referenced_table = None;
    let mut referenced_column = None;
    let mut on_delete = ReferentialAction::default();
    let mut on_update = ReferentialAction::default();
    let mut constrained = implicit;

    for modifier in modifiers {
        let first = modifier.args.first().and_then(Arg::as_str);
        match modifier.name.as_str() {
            "references" => {
                referenced_column = modifier
                    .args
                    .first()
                    .and_then(Arg::as_string_list)
                    .and_then(|columns| columns.into_iter().next());
            }
            "on" => referenced_table = first.map(str::to_string),
            "constrained" => {
                constrained = true;
                referenced_table = first.map(str::to_string);
                referenced_column = modifier.args.get(1).and_then(Arg::as_str).map(str::to_string);
            }
            "onDelete" => on_delete = first.map(ReferentialAction::parse).unwrap_or_default(),
            "onUpdate" => on_update = first.map(ReferentialAction::parse).unwrap_or_default(),
            "cascadeOnDelete" => on_delete = ReferentialAction::Cascade,
            "restrictOnDelete" => on_delete = ReferentialAction::Restrict,
            "nullOnDelete" => on_delete = ReferentialAction::SetNull,
            "noActionOnDelete" => on_delete = ReferentialAction::NoAction,
            "cascadeOnUpdate" => on_update = ReferentialAction::Cascade,
            "restrictOnUpdate" => on_update = ReferentialAction::Restrict,
            "nullOnUpdate" => on_update = ReferentialAction::SetNull,
            "noActionOnUpdate" => on_update = ReferentialAction::NoAction,
            _ => {}
        }
    }

    if constrained {
        referenced_table = referenced_table.or_else(|| Some(naming::guess_referenced_table(column)));
        referenced_column = referenced_column.or_else(|| Some("id".to_string()));
    }

    Some(ForeignKeyDescriptor {
        name: name.unwrap_or_else(|| {
            naming::get_foreign_key_name(naming::FOREIGN_KEY_PATTERN, table, column)
        }),
        table: table.to_string(),
        column: column.to_string(),
        referenced_table: referenced_table?,
        referenced_column: referenced_column?,
        on_delete,
        on_update,
    })
}

/// Column keyword -> (type, unsigned)
fn column_keyword(keyword: &str) -> Option<(AbstractType, bool)> {
    let mapped = match keyword {
        "tinyInteger" => (AbstractType::TinyInteger, false),
        "unsignedTinyInteger" => (AbstractType::TinyInteger, true),
        "smallInteger" => (AbstractType::SmallInteger, false),
        "unsignedSmallInteger" => (AbstractType::SmallInteger, true),
        "mediumInteger" => (AbstractType::MediumInteger, false),
        "unsignedMediumInteger" => (AbstractType::MediumInteger, true),
        "integer" => (AbstractType::Integer, false),
        "unsignedInteger" => (AbstractType::Integer, true),
        "bigInteger" => (AbstractType::BigInteger, false),
        "unsignedBigInteger" | "foreignId" => (AbstractType::BigInteger, true),
        "decimal" => (AbstractType::Decimal, false),
        "unsignedDecimal" => (AbstractType::Decimal, true),
        "float" => (AbstractType::Float, false),
        "double" => (AbstractType::Double, false),
        "string" => (AbstractType::String, false),
        "char" => (AbstractType::Char, false),
        "tinyText" => (AbstractType::TinyText, false),
        "text" => (AbstractType::Text, false),
        "mediumText" => (AbstractType::MediumText, false),
        "longText" => (AbstractType::LongText, false),
        "date" => (AbstractType::Date, false),
        "dateTime" | "dateTimeTz" => (AbstractType::DateTime, false),
        "time" | "timeTz" => (AbstractType::Time, false),
        "timestamp" | "timestampTz" => (AbstractType::Timestamp, false),
        "year" => (AbstractType::Year, false),
        "boolean" => (AbstractType::Boolean, false),
        "json" | "jsonb" => (AbstractType::Json, false),
        "binary" => (AbstractType::Binary, false),
        "enum" => (AbstractType::Enum, false),
        "set" => (AbstractType::Set, false),
        "uuid" | "foreignUuid" => (AbstractType::Uuid, false),
        "ipAddress" => (AbstractType::IpAddress, false),
        "macAddress" => (AbstractType::MacAddress, false),
        other => {
            let lowered = other.to_lowercase();
            const SPATIAL: &[&str] = &[
                "geometry",
                "point",
                "linestring",
                "polygon",
                "multipoint",
                "multilinestring",
                "multipolygon",
                "geometrycollection",
            ];
            if SPATIAL.contains(&lowered.as_str()) {
                (AbstractType::Other(lowered), false)
            } else {
                return None;
            }
        }
    };
    Some(mapped)
}

/// Auto-increment keyword -> integer type
fn increments_keyword(keyword: &str) -> Option<AbstractType> {
    match keyword {
        "id" | "bigIncrements" => Some(AbstractType::BigInteger),
        "increments" | "integerIncrements" => Some(AbstractType::Integer),
        "mediumIncrements" => Some(AbstractType::MediumInteger),
        "smallIncrements" => Some(AbstractType::SmallInteger),
        "tinyIncrements" => Some(AbstractType::TinyInteger),
        _ => None,
    }
}

fn interpret_column(context: &mut ParseContext, call: &ChainCall) -> bool {
    let mut column = if let Some(column_type) = increments_keyword(&call.construct) {
        // `id()` without a name is the conventional primary key
        let name = call.name.as_deref().unwrap_or("id");
        let mut column = ColumnDescriptor::new(name, column_type).unsigned();
        column.auto_increment = true;
        column.primary_key = true;
        column
    } else {
        let Some((column_type, unsigned)) = column_keyword(&call.construct) else {
            return false;
        };
        let Some(name) = call.name.as_deref() else {
            return false;
        };
        let mut column = ColumnDescriptor::new(name, column_type.clone());
        column.unsigned = unsigned;
        column.params = column_params(&column_type, &call.positional_args);

        if column_type.is_integer() {
            // integer('votes', true, true): auto-increment, unsigned
            if call.positional_args.first().and_then(Arg::as_bool) == Some(true) {
                column.auto_increment = true;
                column.primary_key = true;
            }
            if call.positional_args.get(1).and_then(Arg::as_bool) == Some(true) {
                column.unsigned = true;
            }
        }
        column
    };

    for modifier in &call.modifiers {
        apply_modifier(context, &mut column, modifier);
    }

    let is_foreign = matches!(call.construct.as_str(), "foreignId" | "foreignUuid")
        && call.modifier("constrained").is_some()
        || call.modifier("references").is_some();
    if is_foreign {
        if let Some(fk) = build_foreign_key(&context.table.name, &column.name, None, &call.modifiers, false) {
            context.add_foreign_key(fk);
        }
    }

    context.table.add_column(column);
    true
}

fn column_params(column_type: &AbstractType, args: &[Arg]) -> TypeParams {
    let number = |index: usize| args.get(index).and_then(Arg::as_u32);
    match column_type {
        AbstractType::String | AbstractType::Char => {
            TypeParams::Length(number(0).unwrap_or(DEFAULT_STRING_LENGTH))
        }
        AbstractType::Decimal => TypeParams::Precision {
            precision: number(0).unwrap_or(DEFAULT_DECIMAL_PRECISION),
            scale: number(1).unwrap_or(DEFAULT_DECIMAL_SCALE),
        },
        AbstractType::Float | AbstractType::Double => match (number(0), number(1)) {
            (Some(precision), Some(scale)) => TypeParams::Precision { precision, scale },
            _ => TypeParams::None,
        },
        AbstractType::Enum | AbstractType::Set => TypeParams::Values(
            args.first()
                .and_then(Arg::as_string_list)
                .unwrap_or_default(),
        ),
        AbstractType::DateTime | AbstractType::Time | AbstractType::Timestamp => fraction_param(args.first()),
        _ => TypeParams::None,
    }
}

fn default_from_arg(arg: &Arg) -> Option<DefaultValue> {
    match arg {
        Arg::Str(text) => Some(DefaultValue::Text(text.clone())),
        Arg::Number(number) => Some(DefaultValue::Number(number.clone())),
        Arg::Bool(flag) => Some(DefaultValue::Bool(*flag)),
        Arg::Null => Some(DefaultValue::Null),
        Arg::Raw(expression) if is_current_timestamp(expression) => Some(DefaultValue::CurrentTimestamp),
        // raw expressions render verbatim
        Arg::Raw(expression) => Some(DefaultValue::Number(expression.clone())),
        Arg::List(_) => None,
    }
}

fn apply_modifier(context: &mut ParseContext, column: &mut ColumnDescriptor, modifier: &Call) {
    let first = modifier.args.first();
    match modifier.name.as_str() {
        "nullable" => column.nullable = first.and_then(Arg::as_bool).unwrap_or(true),
        "default" => column.default = first.and_then(default_from_arg),
        "useCurrent" => column.default = Some(DefaultValue::CurrentTimestamp),
        "unsigned" => column.unsigned = true,
        "comment" => column.comment = first.and_then(Arg::as_str).map(str::to_string),
        "after" => column.after = first.and_then(Arg::as_str).map(str::to_string),
        "autoIncrement" => {
            column.auto_increment = true;
            column.primary_key = true;
        }
        "primary" => column.primary_key = true,
        "unique" | "index" | "spatialIndex" => {
            let kind = match modifier.name.as_str() {
                "unique" => IndexKind::Unique,
                "spatialIndex" => IndexKind::Spatial,
                _ => IndexKind::Normal,
            };
            let name = first.and_then(Arg::as_str).map(str::to_string);
            context.add_index(kind, vec![column.name.clone()], name);
        }
        // foreign key modifiers are handled with the whole chain
        "constrained" | "references" | "on" | "onDelete" | "onUpdate" | "cascadeOnDelete"
        | "restrictOnDelete" | "nullOnDelete" | "noActionOnDelete" | "cascadeOnUpdate"
        | "restrictOnUpdate" | "nullOnUpdate" | "noActionOnUpdate" => {}
        other => {
            tracing::debug!(column = %column.name, modifier = other, "Ignoring modifier");
        }
    }
}

/// Render a table back into definition text
///
/// The output re-parses into a structurally identical [`TableSchema`].
pub fn to_definition(schema: &TableSchema) -> String {
    let mut lines = Vec::new();

    for column in &schema.columns {
        if schema.has_timestamps && column.name == "updated_at" && schema.has_column("created_at") {
            continue;
        }
        if schema.has_timestamps && column.name == "created_at" {
            lines.push(format!("timestamps({})", fraction_arg(&column.params)));
            continue;
        }
        if schema.has_soft_deletes && schema.soft_deletes_column.as_deref() == Some(column.name.as_str()) {
            lines.push(soft_deletes(column));
            continue;
        }
        lines.push(render_column(column));
    }

    for index in &schema.indexes {
        let construct = match index.kind {
            IndexKind::Unique => "unique",
            IndexKind::Normal => "index",
            IndexKind::Spatial => "spatialIndex",
        };
        lines.push(format!(
            "{}([{}], {})",
            construct,
            index.columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
            quote(&index.name)
        ));
    }

    for fk in &schema.foreign_keys {
        lines.push(format!(
            "foreign({}, {})->references({})->on({})->onDelete({})->onUpdate({})",
            quote(&fk.column),
            quote(&fk.name),
            quote(&fk.referenced_column),
            quote(&fk.referenced_table),
            quote(fk.on_delete.as_definition()),
            quote(fk.on_update.as_definition()),
        ));
    }

    lines
        .into_iter()
        .map(|line| format!("$table->{};\n", line))
        .collect()
}

fn soft_deletes(column: &ColumnDescriptor) -> String {
    let fraction = fraction_arg(&column.params);
    match (column.name.as_str(), fraction.is_empty()) {
        ("deleted_at", true) => "softDeletes()".to_string(),
        (name, true) => format!("softDeletes({})", quote(name)),
        (name, false) => format!("softDeletes({}, {})", quote(name), fraction),
    }
}

fn fraction_arg(params: &TypeParams) -> String {
    match params {
        TypeParams::Length(fraction) => fraction.to_string(),
        _ => String::new(),
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn render_column(column: &ColumnDescriptor) -> String {
    let mut line = if column.auto_increment && column.primary_key && column.unsigned && column.column_type.is_integer() {
        let keyword = match column.column_type {
            AbstractType::BigInteger => "id",
            AbstractType::Integer => "increments",
            AbstractType::MediumInteger => "mediumIncrements",
            AbstractType::SmallInteger => "smallIncrements",
            _ => "tinyIncrements",
        };
        if keyword == "id" && column.name == "id" {
            "id()".to_string()
        } else {
            format!("{}({})", keyword, quote(&column.name))
        }
    } else {
        let keyword = definition_keyword(&column.column_type);
        let keyword = if column.unsigned && column.column_type.is_integer() {
            let mut chars = keyword.chars();
            let capitalized: String = chars
                .next()
                .map(|c| c.to_uppercase().chain(chars).collect())
                .unwrap_or_default();
            format!("unsigned{}", capitalized)
        } else {
            keyword.to_string()
        };

        let mut args = vec![quote(&column.name)];
        match &column.params {
            TypeParams::Length(length) => args.push(length.to_string()),
            TypeParams::Precision { precision, scale } => {
                args.push(precision.to_string());
                args.push(scale.to_string());
            }
            TypeParams::Values(values) => args.push(format!(
                "[{}]",
                values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(", ")
            )),
            TypeParams::None => {}
        }

        let mut line = format!("{}({})", keyword, args.join(", "));
        if column.unsigned && !column.column_type.is_integer() {
            line.push_str("->unsigned()");
        }
        if column.auto_increment {
            line.push_str("->autoIncrement()");
        } else if column.primary_key {
            line.push_str("->primary()");
        }
        line
    };

    if column.nullable {
        line.push_str("->nullable()");
    }
    if let Some(default) = &column.default {
        let rendered = match default {
            DefaultValue::Null => "null".to_string(),
            DefaultValue::Text(text) => quote(text),
            DefaultValue::Number(number) if number.parse::<f64>().is_ok() => number.clone(),
            DefaultValue::Number(expression) => format!("DB::raw({})", quote(expression)),
            DefaultValue::Bool(flag) => flag.to_string(),
            DefaultValue::CurrentTimestamp => "DB::raw('CURRENT_TIMESTAMP')".to_string(),
        };
        line.push_str(&format!("->default({})", rendered));
    }
    if let Some(comment) = &column.comment {
        line.push_str(&format!("->comment({})", quote(comment)));
    }
    if let Some(after) = &column.after {
        line.push_str(&format!("->after({})", quote(after)));
    }
    line
}
