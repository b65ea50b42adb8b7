use serde_json::{json, Map, Value};

use crate::types::{Document, IndexFilter};

/// ReQL term types used by the query builder
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TermType {
    MakeArray = 2,
    Var = 10,
    Db = 14,
    Table = 15,
    Eq = 17,
    Filter = 39,
    Delete = 54,
    Insert = 56,
    DbCreate = 57,
    DbList = 59,
    TableCreate = 60,
    TableList = 62,
    Func = 69,
    IndexCreate = 75,
    IndexList = 77,
    GetAll = 78,
    Changes = 152,
    Bracket = 170,
}

/// A ReQL query node, serialised as `[type, [args], {optargs}]`
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    kind: TermType,
    args: Vec<Value>,
    optargs: Map<String, Value>,
}

impl Term {
    fn new(kind: TermType, args: Vec<Value>) -> Self {
        Self {
            kind,
            args,
            optargs: Map::new(),
        }
    }

    fn chain(&self, kind: TermType, mut extra: Vec<Value>) -> Self {
        let mut args = Vec::with_capacity(extra.len() + 1);
        args.push(self.to_json());
        args.append(&mut extra);
        Self::new(kind, args)
    }

    fn optarg(mut self, key: &str, value: Value) -> Self {
        self.optargs.insert(key.to_string(), value);
        self
    }

    pub fn kind(&self) -> TermType {
        self.kind
    }

    pub fn to_json(&self) -> Value {
        let kind = self.kind as u16;
        if self.optargs.is_empty() {
            json!([kind, self.args])
        } else {
            json!([kind, self.args, self.optargs])
        }
    }

    pub fn db_list() -> Self {
        Self::new(TermType::DbList, vec![])
    }

    pub fn db_create(name: &str) -> Self {
        Self::new(TermType::DbCreate, vec![json!(name)])
    }

    pub fn db(name: &str) -> Self {
        Self::new(TermType::Db, vec![json!(name)])
    }

    pub fn table_list(&self) -> Self {
        self.chain(TermType::TableList, vec![])
    }

    pub fn table_create(&self, name: &str) -> Self {
        self.chain(TermType::TableCreate, vec![json!(name)])
    }

    pub fn table(&self, name: &str) -> Self {
        self.chain(TermType::Table, vec![json!(name)])
    }

    pub fn index_list(&self) -> Self {
        self.chain(TermType::IndexList, vec![])
    }

    pub fn index_create(&self, name: &str) -> Self {
        self.chain(TermType::IndexCreate, vec![json!(name)])
    }

    pub fn insert(&self, document: &Document) -> Self {
        self.chain(
            TermType::Insert,
            vec![datum(&Value::Object(document.clone()))],
        )
    }

    /// `table.get_all(id, index=...)`
    pub fn get_all(&self, filter: &IndexFilter) -> Self {
        self.chain(TermType::GetAll, vec![json!(filter.id)])
            .optarg("index", json!(filter.index))
    }

    /// `seq.filter(lambda row: row[field] == value)`
    pub fn filter_eq(&self, filter: &IndexFilter) -> Self {
        let row = json!([TermType::Var as u16, [1]]);
        let field = json!([TermType::Bracket as u16, [row, filter.index]]);
        let body = json!([TermType::Eq as u16, [field, filter.id]]);
        let params = json!([TermType::MakeArray as u16, [1]]);
        let func = json!([TermType::Func as u16, [params, body]]);
        self.chain(TermType::Filter, vec![func])
    }

    pub fn changes(&self, include_initial: bool) -> Self {
        self.chain(TermType::Changes, vec![])
            .optarg("include_initial", json!(include_initial))
    }

    pub fn delete(&self, return_changes: bool) -> Self {
        self.chain(TermType::Delete, vec![])
            .optarg("return_changes", json!(return_changes))
    }
}

/// Convert a JSON value into a term argument. Arrays are not datums on the
/// wire and must be wrapped in `MAKE_ARRAY`; objects are sent as-is with
/// their values converted.
pub fn datum(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let items: Vec<Value> = items.iter().map(datum).collect();
            json!([TermType::MakeArray as u16, items])
        }
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), datum(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
