//! Dynamic `WHERE` clause builder.
//!
//! Every list query starts from [`Clause::visible`], which renders the
//! caller's [`Visibility`] as the first conjunct. Caller filters are only ever
//! appended with `AND`, so they narrow the result and can never widen it.
//!
//! Queries using this builder must join the owning account as `o`.

use rusqlite::types::Value;
use tracker_core::policy::Visibility;

use crate::encode::encode_uuid;

#[derive(Debug, Clone, Default)]
pub struct Clause {
  conds:  Vec<String>,
  params: Vec<Value>,
}

impl Clause {
  /// A clause admitting exactly the rows `visibility` admits. `owner_col` is
  /// the qualified owner column of the queried table.
  pub fn visible(visibility: Visibility, owner_col: &str) -> Self {
    let mut clause = Self::default();
    match visibility {
      Visibility::Unrestricted => {}
      Visibility::Subgroup(subgroup) => {
        clause.push("o.subgroup = ?", subgroup.to_string());
      }
      Visibility::Owner(id) => {
        clause.push(format!("{owner_col} = ?"), encode_uuid(id));
      }
      Visibility::Nothing => clause.conds.push("1 = 0".to_owned()),
    }
    clause
  }

  /// Append `cond`, which must contain exactly one `?` placeholder.
  pub fn push(&mut self, cond: impl Into<String>, value: impl Into<Value>) {
    self.conds.push(cond.into());
    self.params.push(value.into());
  }

  /// Append `cond` only when a value is supplied.
  pub fn push_opt<T: Into<Value>>(&mut self, cond: &str, value: Option<T>) {
    if let Some(value) = value {
      self.push(cond, value);
    }
  }

  /// Case-insensitive substring match over any of `columns`.
  pub fn contains(&mut self, columns: &[&str], text: Option<&str>) {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
      return;
    };
    let pattern = format!("%{}%", escape_like(text));
    let ors: Vec<String> = columns
      .iter()
      .map(|c| format!("{c} LIKE ? ESCAPE '\\'"))
      .collect();
    self.conds.push(format!("({})", ors.join(" OR ")));
    for _ in columns {
      self.params.push(Value::Text(pattern.clone()));
    }
  }

  /// Render as `WHERE ...`, or an empty string when nothing constrains.
  pub fn where_sql(&self) -> String {
    if self.conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", self.conds.join(" AND "))
    }
  }

  /// Append a condition that takes no parameter.
  pub fn require(&mut self, cond: &str) { self.conds.push(cond.to_owned()); }

  pub fn into_params(self) -> Vec<Value> { self.params }
}

/// The `SET` list of a partial update. Columns whose value is `None` are left
/// untouched.
#[derive(Debug, Default)]
pub struct Assignments {
  columns: Vec<&'static str>,
  params:  Vec<Value>,
}

impl Assignments {
  pub fn set<T: Into<Value>>(&mut self, column: &'static str, value: Option<T>) {
    if let Some(value) = value {
      self.columns.push(column);
      self.params.push(value.into());
    }
  }

  pub fn is_empty(&self) -> bool { self.columns.is_empty() }

  /// Run `UPDATE table SET ... WHERE key_col = key`. A no-op when empty.
  pub fn execute(
    self,
    conn: &rusqlite::Connection,
    table: &str,
    key_col: &str,
    key: &str,
  ) -> rusqlite::Result<usize> {
    if self.columns.is_empty() {
      return Ok(0);
    }
    let sets: Vec<String> =
      self.columns.iter().map(|c| format!("{c} = ?")).collect();
    let sql =
      format!("UPDATE {table} SET {} WHERE {key_col} = ?", sets.join(", "));
    let mut params = self.params;
    params.push(Value::Text(key.to_owned()));
    conn.execute(&sql, rusqlite::params_from_iter(params))
  }
}

fn escape_like(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for ch in text.chars() {
    if matches!(ch, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(ch);
  }
  out
}
