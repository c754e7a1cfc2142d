//! Symbolic query-builder state and DQL text assembly.
//!
//! A [`BuilderState`] records the builder calls applied since the builder was
//! created. Rendering replays them against a fresh set of DQL parts, the same
//! way the persistence library assembles `getDQL()`, once per combination of
//! literal argument values.

use crate::error::{CheckError, CheckResult};
use crate::reflection::QUERY_BUILDER_CLASS;
use crate::types::Type;

/// Upper bound on the number of candidate texts one builder may expand into.
pub const MAX_DQL_CANDIDATES: usize = 32;

/// Builder methods that return the builder itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuilderMethod {
    Select,
    AddSelect,
    Distinct,
    Delete,
    Update,
    Set,
    From,
    Join,
    InnerJoin,
    LeftJoin,
    IndexBy,
    Where,
    AndWhere,
    OrWhere,
    GroupBy,
    AddGroupBy,
    Having,
    AndHaving,
    OrHaving,
    OrderBy,
    AddOrderBy,
    ResetDqlPart,
    ResetDqlParts,
    AddCriteria,
    SetParameter,
    SetParameters,
    SetFirstResult,
    SetMaxResults,
    SetCacheable,
    SetCacheRegion,
    SetLifetime,
    SetCacheMode,
}

impl BuilderMethod {
    /// Parse a method name; method names are case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        use BuilderMethod::*;
        let method = match name.to_ascii_lowercase().as_str() {
            "select" => Select,
            "addselect" => AddSelect,
            "distinct" => Distinct,
            "delete" => Delete,
            "update" => Update,
            "set" => Set,
            "from" => From,
            "join" => Join,
            "innerjoin" => InnerJoin,
            "leftjoin" => LeftJoin,
            "indexby" => IndexBy,
            "where" => Where,
            "andwhere" => AndWhere,
            "orwhere" => OrWhere,
            "groupby" => GroupBy,
            "addgroupby" => AddGroupBy,
            "having" => Having,
            "andhaving" => AndHaving,
            "orhaving" => OrHaving,
            "orderby" => OrderBy,
            "addorderby" => AddOrderBy,
            "resetdqlpart" => ResetDqlPart,
            "resetdqlparts" => ResetDqlParts,
            "addcriteria" => AddCriteria,
            "setparameter" => SetParameter,
            "setparameters" => SetParameters,
            "setfirstresult" => SetFirstResult,
            "setmaxresults" => SetMaxResults,
            "setcacheable" => SetCacheable,
            "setcacheregion" => SetCacheRegion,
            "setlifetime" => SetLifetime,
            "setcachemode" => SetCacheMode,
            _ => return None,
        };
        Some(method)
    }

    pub fn name(self) -> &'static str {
        use BuilderMethod::*;
        match self {
            Select => "select",
            AddSelect => "addSelect",
            Distinct => "distinct",
            Delete => "delete",
            Update => "update",
            Set => "set",
            From => "from",
            Join => "join",
            InnerJoin => "innerJoin",
            LeftJoin => "leftJoin",
            IndexBy => "indexBy",
            Where => "where",
            AndWhere => "andWhere",
            OrWhere => "orWhere",
            GroupBy => "groupBy",
            AddGroupBy => "addGroupBy",
            Having => "having",
            AndHaving => "andHaving",
            OrHaving => "orHaving",
            OrderBy => "orderBy",
            AddOrderBy => "addOrderBy",
            ResetDqlPart => "resetDQLPart",
            ResetDqlParts => "resetDQLParts",
            AddCriteria => "addCriteria",
            SetParameter => "setParameter",
            SetParameters => "setParameters",
            SetFirstResult => "setFirstResult",
            SetMaxResults => "setMaxResults",
            SetCacheable => "setCacheable",
            SetCacheRegion => "setCacheRegion",
            SetLifetime => "setLifetime",
            SetCacheMode => "setCacheMode",
        }
    }

    /// Whether the call changes the DQL text.
    pub fn affects_dql(self) -> bool {
        use BuilderMethod::*;
        !matches!(
            self,
            SetParameter
                | SetParameters
                | SetFirstResult
                | SetMaxResults
                | SetCacheable
                | SetCacheRegion
                | SetLifetime
                | SetCacheMode
        )
    }

    fn required_args(self) -> usize {
        use BuilderMethod::*;
        match self {
            Set | From | Join | InnerJoin | LeftJoin | IndexBy => 2,
            Where | GroupBy | AddGroupBy | Having | AndHaving | OrHaving | OrderBy | AddOrderBy
            | ResetDqlPart | AddCriteria => 1,
            _ => 0,
        }
    }
}

/// One recorded builder call.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderCall {
    pub method: BuilderMethod,
    pub args: Vec<Type>,
}

/// Calls applied to a builder since it was created.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuilderState {
    calls: Vec<BuilderCall>,
}

impl BuilderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this state with one more call applied.
    pub fn with_call(&self, method: BuilderMethod, args: Vec<Type>) -> Self {
        let mut calls = self.calls.clone();
        calls.push(BuilderCall { method, args });
        Self { calls }
    }

    pub fn calls(&self) -> &[BuilderCall] {
        &self.calls
    }

    /// Every DQL text this builder may produce.
    ///
    /// `Ok(None)` when an argument is not a known literal or the number of
    /// combinations exceeds [`MAX_DQL_CANDIDATES`]. Errors are raised for calls
    /// the builder itself would reject.
    pub fn dql_candidates(&self) -> CheckResult<Option<Vec<String>>> {
        let mut choices: Vec<Vec<Vec<Arg>>> = Vec::with_capacity(self.calls.len());
        let mut total = 1usize;

        for call in &self.calls {
            if !call.method.affects_dql() {
                choices.push(vec![Vec::new()]);
                continue;
            }
            if call.args.len() < call.method.required_args() {
                return Err(CheckError::Other(format!(
                    "Too few arguments to function {}::{}(), {} passed and at least {} expected",
                    QUERY_BUILDER_CLASS,
                    call.method.name(),
                    call.args.len(),
                    call.method.required_args()
                )));
            }
            let Some(alternatives) = call_alternatives(&call.args) else {
                return Ok(None);
            };
            total = total.saturating_mul(alternatives.len());
            if total > MAX_DQL_CANDIDATES {
                return Ok(None);
            }
            choices.push(alternatives);
        }

        let mut out: Vec<String> = Vec::new();
        let mut index = vec![0usize; choices.len()];
        loop {
            let mut parts = DqlParts::default();
            for (i, call) in self.calls.iter().enumerate() {
                if call.method.affects_dql() {
                    parts.apply(call.method, &choices[i][index[i]])?;
                }
            }
            let Some(dql) = parts.render() else {
                return Ok(None);
            };
            if !out.contains(&dql) {
                out.push(dql);
            }

            // Advance the odometer; done once every position wrapped.
            let mut pos = choices.len();
            loop {
                if pos == 0 {
                    return Ok(Some(out));
                }
                pos -= 1;
                index[pos] += 1;
                if index[pos] < choices[pos].len() {
                    break;
                }
                index[pos] = 0;
            }
        }
    }
}

/// A literal argument value.
#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Str(String),
    Null,
    Bool(bool),
    List(Vec<String>),
    /// Value that only matters for its presence (criteria objects).
    Opaque,
}

impl Arg {
    fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    /// String items of the argument; a list contributes every element.
    fn strings(&self) -> Vec<String> {
        match self {
            Arg::Str(s) => vec![s.clone()],
            Arg::List(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            Arg::Null => false,
            Arg::Bool(b) => *b,
            Arg::Str(s) => !s.is_empty() && s != "0",
            Arg::List(items) => !items.is_empty(),
            Arg::Opaque => true,
        }
    }
}

/// Literal values one argument may take, `None` when unknown.
fn arg_alternatives(ty: &Type) -> Option<Vec<Arg>> {
    match ty {
        Type::Null => Some(vec![Arg::Null]),
        Type::ConstantBool(b) => Some(vec![Arg::Bool(*b)]),
        Type::ConstantString(s) => Some(vec![Arg::Str(s.clone())]),
        Type::ConstantInt(i) => Some(vec![Arg::Str(i.to_string())]),
        Type::ConstantArray(array) => {
            let mut items = Vec::with_capacity(array.values.len());
            for value in &array.values {
                match value {
                    Type::ConstantString(s) => items.push(s.clone()),
                    _ => return None,
                }
            }
            Some(vec![Arg::List(items)])
        }
        Type::Union(types) => {
            let mut out = Vec::new();
            for t in types {
                out.extend(arg_alternatives(t)?);
            }
            Some(out)
        }
        _ => None,
    }
}

/// Cartesian product of the alternatives of every argument of one call.
fn call_alternatives(args: &[Type]) -> Option<Vec<Vec<Arg>>> {
    let mut out: Vec<Vec<Arg>> = vec![Vec::new()];
    for arg in args {
        let alternatives = arg_alternatives(arg)?;
        let mut next = Vec::with_capacity(out.len() * alternatives.len());
        for prefix in &out {
            for alt in &alternatives {
                let mut combined = prefix.clone();
                combined.push(alt.clone());
                next.push(combined);
            }
        }
        if next.len() > MAX_DQL_CANDIDATES {
            return None;
        }
        out = next;
    }
    Some(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum QueryKind {
    #[default]
    Select,
    Delete,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompositeKind {
    And,
    Or,
}

impl CompositeKind {
    fn separator(self) -> &'static str {
        match self {
            CompositeKind::And => " AND ",
            CompositeKind::Or => " OR ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Text(String),
    Composite(CompositeKind, Vec<Predicate>),
}

impl Predicate {
    fn composite(kind: CompositeKind, parts: Vec<Predicate>) -> Predicate {
        let parts = parts
            .into_iter()
            .filter(|p| !matches!(p, Predicate::Composite(_, inner) if inner.is_empty()))
            .collect();
        Predicate::Composite(kind, parts)
    }

    fn count(&self) -> usize {
        match self {
            Predicate::Text(_) => 1,
            Predicate::Composite(_, parts) => parts.len(),
        }
    }

    fn render(&self) -> String {
        match self {
            Predicate::Text(text) => text.clone(),
            Predicate::Composite(_, parts) if parts.len() == 1 => parts[0].render(),
            Predicate::Composite(kind, parts) => parts
                .iter()
                .map(render_nested)
                .collect::<Vec<_>>()
                .join(kind.separator()),
        }
    }
}

fn render_nested(part: &Predicate) -> String {
    let text = part.render();
    if matches!(part, Predicate::Composite(..)) && part.count() > 1 {
        return format!("({text})");
    }
    let upper = text.to_uppercase();
    if upper.contains(" OR ") || upper.contains(" AND ") {
        return format!("({text})");
    }
    text
}

#[derive(Debug, Clone, PartialEq)]
struct FromPart {
    entity: String,
    alias: Option<String>,
    index_by: Option<String>,
}

impl FromPart {
    fn render(&self) -> String {
        let mut out = self.entity.clone();
        if let Some(alias) = &self.alias {
            out.push(' ');
            out.push_str(alias);
        }
        if let Some(index_by) = &self.index_by {
            out.push_str(" INDEX BY ");
            out.push_str(index_by);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
struct JoinPart {
    kind: &'static str,
    join: String,
    alias: String,
    condition_type: Option<String>,
    condition: Option<String>,
    index_by: Option<String>,
}

impl JoinPart {
    fn render(&self) -> String {
        let mut out = format!("{} JOIN {} {}", self.kind, self.join, self.alias);
        if let Some(index_by) = &self.index_by {
            out.push_str(" INDEX BY ");
            out.push_str(index_by);
        }
        if let Some(condition) = &self.condition {
            let condition_type = self.condition_type.as_deref().unwrap_or("ON").to_uppercase();
            out.push_str(&format!(" {condition_type} {condition}"));
        }
        out
    }
}

#[derive(Debug, Default)]
struct DqlParts {
    kind: QueryKind,
    distinct: bool,
    select: Vec<String>,
    from: Vec<FromPart>,
    /// Joins grouped by the root alias they hang off, in insertion order.
    joins: Vec<(String, Vec<JoinPart>)>,
    join_root_aliases: Vec<(String, String)>,
    set: Vec<String>,
    where_: Option<Predicate>,
    group_by: Vec<String>,
    having: Option<Predicate>,
    order_by: Vec<String>,
    /// Criteria objects contribute text we cannot see.
    opaque: bool,
}

impl DqlParts {
    fn apply(&mut self, method: BuilderMethod, args: &[Arg]) -> CheckResult<()> {
        use BuilderMethod::*;
        let arg = |i: usize| args.get(i).and_then(Arg::as_str).map(str::to_string);

        match method {
            Select | AddSelect => {
                self.kind = QueryKind::Select;
                let items: Vec<String> = match args.first() {
                    Some(Arg::List(items)) => items.clone(),
                    _ => args.iter().flat_map(Arg::strings).collect(),
                };
                if items.is_empty() {
                    return Ok(());
                }
                if method == Select {
                    self.select.clear();
                }
                self.select.push(items.join(", "));
            }
            Distinct => self.distinct = args.first().is_none_or(Arg::is_truthy),
            Delete | Update => {
                self.kind = if method == Delete {
                    QueryKind::Delete
                } else {
                    QueryKind::Update
                };
                if let Some(entity) = arg(0) {
                    self.from = vec![FromPart {
                        entity,
                        alias: arg(1),
                        index_by: None,
                    }];
                }
            }
            Set => {
                let (key, value) = (args[0].strings().concat(), args[1].strings().concat());
                self.set.push(format!("{key} = {value}"));
            }
            From => self.from.push(FromPart {
                entity: args[0].strings().concat(),
                alias: Some(args[1].strings().concat()),
                index_by: arg(2),
            }),
            Join | InnerJoin | LeftJoin => {
                let join = args[0].strings().concat();
                let alias = args[1].strings().concat();
                let parent_alias = join.split_once('.').map(|(p, _)| p).unwrap_or("").to_string();
                let root = self.find_root_alias(&alias, &parent_alias)?;
                let part = JoinPart {
                    kind: if method == LeftJoin { "LEFT" } else { "INNER" },
                    join,
                    alias,
                    condition_type: arg(2),
                    condition: arg(3),
                    index_by: arg(4),
                };
                match self.joins.iter_mut().find(|(r, _)| *r == root) {
                    Some((_, list)) => list.push(part),
                    None => self.joins.push((root, vec![part])),
                }
            }
            IndexBy => {
                let alias = args[0].strings().concat();
                let index_by = args[1].strings().concat();
                let Some(from) = self
                    .from
                    .iter_mut()
                    .find(|f| f.alias.as_deref() == Some(alias.as_str()))
                else {
                    return Err(CheckError::Other(format!(
                        "[Semantical Error] Specified root alias {alias} must be set before invoking indexBy()."
                    )));
                };
                from.index_by = Some(index_by);
            }
            Where | Having => {
                let predicate = Predicate::composite(CompositeKind::And, texts(args));
                if method == Where {
                    self.where_ = Some(predicate);
                } else {
                    self.having = Some(predicate);
                }
            }
            AndWhere | OrWhere | AndHaving | OrHaving => {
                let kind = if matches!(method, AndWhere | AndHaving) {
                    CompositeKind::And
                } else {
                    CompositeKind::Or
                };
                let slot = if matches!(method, AndWhere | OrWhere) {
                    &mut self.where_
                } else {
                    &mut self.having
                };
                let added = texts(args);
                *slot = Some(match slot.take() {
                    Some(Predicate::Composite(k, mut parts)) if k == kind => {
                        parts.extend(added);
                        Predicate::composite(kind, parts)
                    }
                    Some(existing) => {
                        let mut parts = vec![existing];
                        parts.extend(added);
                        Predicate::composite(kind, parts)
                    }
                    None => Predicate::composite(kind, added),
                });
            }
            GroupBy | AddGroupBy => {
                if method == GroupBy {
                    self.group_by.clear();
                }
                let items: Vec<String> = args.iter().flat_map(Arg::strings).collect();
                self.group_by.push(items.join(", "));
            }
            OrderBy | AddOrderBy => {
                if method == OrderBy {
                    self.order_by.clear();
                }
                let sort = args[0].strings().concat();
                match arg(1) {
                    Some(order) => self.order_by.push(format!("{sort} {order}")),
                    None => self.order_by.push(sort),
                }
            }
            ResetDqlPart => self.reset(&args[0].strings().concat()),
            ResetDqlParts => {
                let parts = match args.first() {
                    Some(Arg::List(items)) => items.clone(),
                    _ => [
                        "distinct", "select", "from", "join", "set", "where", "groupBy", "having",
                        "orderBy",
                    ]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                };
                for part in parts {
                    self.reset(&part);
                }
            }
            AddCriteria => self.opaque = true,
            SetParameter | SetParameters | SetFirstResult | SetMaxResults | SetCacheable
            | SetCacheRegion | SetLifetime | SetCacheMode => {}
        }
        Ok(())
    }

    fn reset(&mut self, part: &str) {
        match part {
            "distinct" => self.distinct = false,
            "select" => self.select.clear(),
            "from" => self.from.clear(),
            "join" => self.joins.clear(),
            "set" => self.set.clear(),
            "where" => self.where_ = None,
            "groupBy" => self.group_by.clear(),
            "having" => self.having = None,
            "orderBy" => self.order_by.clear(),
            _ => {}
        }
    }

    fn find_root_alias(&mut self, alias: &str, parent_alias: &str) -> CheckResult<String> {
        let root_aliases: Vec<&str> = self.from.iter().filter_map(|f| f.alias.as_deref()).collect();
        let root = if root_aliases.contains(&parent_alias) {
            parent_alias.to_string()
        } else if let Some((_, root)) = self.join_root_aliases.iter().find(|(a, _)| a == parent_alias) {
            root.clone()
        } else {
            match root_aliases.first() {
                Some(first) => first.to_string(),
                None => {
                    return Err(CheckError::Other(
                        "No alias was set before invoking getRootAlias().".to_string(),
                    ));
                }
            }
        };
        self.join_root_aliases.push((alias.to_string(), root.clone()));
        Ok(root)
    }

    fn render(&self) -> Option<String> {
        if self.opaque {
            return None;
        }
        let mut dql = match self.kind {
            QueryKind::Select => {
                let mut dql = String::from("SELECT");
                if self.distinct {
                    dql.push_str(" DISTINCT");
                }
                if !self.select.is_empty() {
                    dql.push(' ');
                    dql.push_str(&self.select.join(", "));
                }
                if !self.from.is_empty() {
                    let clauses: Vec<String> = self
                        .from
                        .iter()
                        .map(|from| {
                            let mut clause = from.render();
                            let joins = from.alias.as_ref().and_then(|alias| {
                                self.joins.iter().find(|(root, _)| root == alias)
                            });
                            for join in joins.map(|(_, list)| list.as_slice()).unwrap_or_default() {
                                clause.push(' ');
                                clause.push_str(&join.render());
                            }
                            clause
                        })
                        .collect();
                    dql.push_str(" FROM ");
                    dql.push_str(&clauses.join(", "));
                }
                dql
            }
            QueryKind::Delete | QueryKind::Update => {
                let mut dql = String::from(if self.kind == QueryKind::Delete {
                    "DELETE"
                } else {
                    "UPDATE"
                });
                if !self.from.is_empty() {
                    dql.push(' ');
                    dql.push_str(
                        &self.from.iter().map(FromPart::render).collect::<Vec<_>>().join(", "),
                    );
                }
                if self.kind == QueryKind::Update && !self.set.is_empty() {
                    dql.push_str(" SET ");
                    dql.push_str(&self.set.join(", "));
                }
                dql
            }
        };

        if let Some(predicate) = &self.where_ {
            dql.push_str(" WHERE ");
            dql.push_str(&predicate.render());
        }
        if self.kind == QueryKind::Select {
            if !self.group_by.is_empty() {
                dql.push_str(" GROUP BY ");
                dql.push_str(&self.group_by.join(", "));
            }
            if let Some(predicate) = &self.having {
                dql.push_str(" HAVING ");
                dql.push_str(&predicate.render());
            }
        }
        if !self.order_by.is_empty() {
            dql.push_str(" ORDER BY ");
            dql.push_str(&self.order_by.join(", "));
        }
        Some(dql)
    }
}

fn texts(args: &[Arg]) -> Vec<Predicate> {
    args.iter()
        .flat_map(Arg::strings)
        .map(Predicate::Text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str) -> Type {
        Type::constant_string(value)
    }

    fn state(calls: &[(&str, Vec<Type>)]) -> BuilderState {
        calls.iter().fold(BuilderState::new(), |state, (name, args)| {
            let method = BuilderMethod::from_name(name).expect("builder method");
            state.with_call(method, args.clone())
        })
    }

    fn single(state: &BuilderState) -> String {
        let mut candidates = state.dql_candidates().unwrap().expect("literal dql");
        assert_eq!(candidates.len(), 1);
        candidates.remove(0)
    }

    #[test]
    fn test_method_names_are_case_insensitive() {
        assert_eq!(BuilderMethod::from_name("ANDWHERE"), Some(BuilderMethod::AndWhere));
        assert_eq!(BuilderMethod::from_name("getQuery"), None);
        assert!(!BuilderMethod::SetParameter.affects_dql());
    }

    #[test]
    fn test_select_from_where() {
        let qb = state(&[
            ("select", vec![s("e")]),
            ("from", vec![s("App\\Entity"), s("e")]),
            ("andWhere", vec![s("e.id = 1")]),
            ("setParameter", vec![s("id"), Type::Int]),
        ]);
        assert_eq!(single(&qb), "SELECT e FROM App\\Entity e WHERE e.id = 1");
    }

    #[test]
    fn test_composite_predicates_are_parenthesised() {
        let qb = state(&[
            ("select", vec![s("e")]),
            ("from", vec![s("E"), s("e")]),
            ("where", vec![s("e.a = 1 OR e.b = 2")]),
            ("andWhere", vec![s("e.c = 3")]),
            ("orWhere", vec![s("e.d = 4")]),
        ]);
        assert_eq!(
            single(&qb),
            "SELECT e FROM E e WHERE ((e.a = 1 OR e.b = 2) AND e.c = 3) OR e.d = 4"
        );
    }

    #[test]
    fn test_joins_attach_to_root_alias() {
        let qb = state(&[
            ("select", vec![s("e"), s("c")]),
            ("from", vec![s("E"), s("e")]),
            ("from", vec![s("F"), s("f")]),
            ("leftJoin", vec![s("e.comments"), s("c"), s("WITH"), s("c.ok = 1")]),
            ("innerJoin", vec![s("c.author"), s("a")]),
            ("indexBy", vec![s("f"), s("f.id")]),
            ("orderBy", vec![s("e.id"), s("DESC")]),
            ("addOrderBy", vec![s("c.id")]),
        ]);
        assert_eq!(
            single(&qb),
            "SELECT e, c FROM E e LEFT JOIN e.comments c WITH c.ok = 1 INNER JOIN c.author a, \
             F f INDEX BY f.id ORDER BY e.id DESC, c.id"
        );
    }

    #[test]
    fn test_update_and_delete() {
        let update = state(&[
            ("update", vec![s("E"), s("e")]),
            ("set", vec![s("e.title"), s(":title")]),
            ("where", vec![s("e.id = :id")]),
        ]);
        assert_eq!(single(&update), "UPDATE E e SET e.title = :title WHERE e.id = :id");

        let delete = state(&[("delete", vec![s("E"), s("e")]), ("where", vec![s("e.id = 1")])]);
        assert_eq!(single(&delete), "DELETE E e WHERE e.id = 1");
    }

    #[test]
    fn test_union_arguments_expand() {
        let qb = state(&[
            ("select", vec![s("e")]),
            ("from", vec![Type::union([s("A"), s("B")]), s("e")]),
        ]);
        let candidates = qb.dql_candidates().unwrap().unwrap();
        assert_eq!(candidates, vec!["SELECT e FROM A e", "SELECT e FROM B e"]);
    }

    #[test]
    fn test_dynamic_arguments() {
        let qb = state(&[("select", vec![s("e")]), ("from", vec![Type::String, s("e")])]);
        assert_eq!(qb.dql_candidates().unwrap(), None);

        // Parameters never affect the text.
        let qb = state(&[
            ("select", vec![s("e")]),
            ("from", vec![s("E"), s("e")]),
            ("setParameter", vec![Type::String, Type::Mixed]),
        ]);
        assert!(qb.dql_candidates().unwrap().is_some());
    }

    #[test]
    fn test_candidate_cap() {
        let many = Type::union((0..6).map(|i| s(&format!("E{i}"))));
        let qb = state(&[
            ("select", vec![s("e")]),
            ("from", vec![many.clone(), s("e")]),
            ("andWhere", vec![Type::union((0..6).map(|i| s(&format!("e.f = {i}"))))]),
        ]);
        assert_eq!(qb.dql_candidates().unwrap(), None);
    }

    #[test]
    fn test_too_few_arguments() {
        let qb = state(&[("select", vec![s("e")]), ("from", vec![s("E")])]);
        let err = qb.dql_candidates().unwrap_err();
        assert!(err.to_string().starts_with("Too few arguments to function Doctrine\\ORM\\QueryBuilder::from()"));
    }

    #[test]
    fn test_join_without_root_alias() {
        let qb = state(&[("select", vec![s("e")]), ("join", vec![s("e.a"), s("a")])]);
        let err = qb.dql_candidates().unwrap_err();
        assert_eq!(err.to_string(), "No alias was set before invoking getRootAlias().");
    }
}
