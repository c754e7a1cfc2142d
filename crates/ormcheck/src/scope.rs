//! Expression type inference within one method body.

use crate::ast::{ArrayItem, Expr, MethodCall, MethodName, Param, Stmt, StmtKind};
use crate::error::CheckResult;
use crate::query_builder::{BuilderMethod, BuilderState, MAX_DQL_CANDIDATES};
use crate::reflection::{
    ClassReflection, ENTITY_MANAGER_INTERFACE, ENTITY_REPOSITORY_CLASS, QUERY_BUILDER_CLASS,
    QUERY_CLASS, ReflectionProvider,
};
use crate::stubs::{EXPR_CLASS, OBJECT_MANAGER_INTERFACE, entity_manager_method_type};
use crate::types::{ConstantArrayType, ObjectType, Type};
use std::collections::BTreeMap;

/// What a rule can ask about the code around the node it is looking at.
pub trait Scope {
    /// Static type of `expr` at this point.
    ///
    /// Fails only when simulating the expression hits a call the runtime would
    /// reject (a builder method called with too few arguments, for instance).
    fn get_type(&self, expr: &Expr) -> CheckResult<Type>;

    /// The class whose body is being analysed.
    fn class_reflection(&self) -> Option<&ClassReflection>;

    fn reflection(&self) -> &ReflectionProvider;
}

/// Flow-sensitive scope over the statements of one method.
///
/// Variables hold the type of their last assignment. Builder calls rooted at a
/// variable advance that variable, whether the call is chained, reassigned or
/// made as a bare statement. The analyser merges the branches of an `if`
/// that fall through by union.
#[derive(Debug, Clone)]
pub struct FlowScope<'a> {
    reflection: &'a ReflectionProvider,
    class: Option<&'a ClassReflection>,
    variables: BTreeMap<String, Type>,
}

impl<'a> FlowScope<'a> {
    pub fn new(reflection: &'a ReflectionProvider, class: Option<&'a ClassReflection>) -> Self {
        Self {
            reflection,
            class,
            variables: BTreeMap::new(),
        }
    }

    /// Scope at the start of a method taking `params`.
    pub fn for_method(
        reflection: &'a ReflectionProvider,
        class: Option<&'a ClassReflection>,
        params: &[Param],
    ) -> Self {
        let mut scope = Self::new(reflection, class);
        for param in params {
            scope.assign(&param.name, param.ty.clone());
        }
        scope
    }

    pub fn assign(&mut self, var: &str, ty: Type) {
        self.variables.insert(var.to_string(), ty);
    }

    pub fn variable(&self, var: &str) -> Option<&Type> {
        self.variables.get(var)
    }

    /// Apply the effects of one statement.
    ///
    /// `If` statements are applied branch by branch by the caller through
    /// [`FlowScope::merge`]; here they only evaluate their condition.
    pub fn apply(&mut self, stmt: &Stmt) -> CheckResult<()> {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.advance_builder_root(expr),
            StmtKind::Assign { var, value } => {
                let ty = self.get_type(value)?;
                self.advance_builder_root(value)?;
                self.assign(var, ty);
                Ok(())
            }
            StmtKind::If { condition, .. } => self.advance_builder_root(condition),
            StmtKind::Return(Some(expr)) => self.advance_builder_root(expr),
            StmtKind::Return(None) => Ok(()),
        }
    }

    /// Join the scopes at the end of two branches.
    pub fn merge(&self, other: &FlowScope<'a>) -> FlowScope<'a> {
        let mut variables = self.variables.clone();
        for (name, ty) in &other.variables {
            let merged = match variables.get(name) {
                Some(existing) => Type::union([existing.clone(), ty.clone()]),
                None => ty.clone(),
            };
            variables.insert(name.clone(), merged);
        }
        FlowScope {
            reflection: self.reflection,
            class: self.class,
            variables,
        }
    }

    /// When `expr` is a builder call chain starting at a variable, give the
    /// variable the type of the outermost builder call in the chain.
    fn advance_builder_root(&mut self, expr: &Expr) -> CheckResult<()> {
        let Some((var, prefix)) = builder_chain_root(expr) else {
            return Ok(());
        };
        let Some(current) = self.variables.get(var) else {
            return Ok(());
        };
        if !is_builder(current) {
            return Ok(());
        }
        let advanced = self.get_type(prefix)?;
        if is_builder(&advanced) {
            tracing::trace!(target: "ormcheck.rules", var, "builder variable advanced");
            self.assign(var, advanced);
        }
        Ok(())
    }

    fn array_type(&self, items: &[ArrayItem]) -> CheckResult<Type> {
        let mut keys = Vec::with_capacity(items.len());
        let mut values = Vec::with_capacity(items.len());
        let mut next_index = 0i64;
        let mut constant = true;

        for item in items {
            let key = match &item.key {
                Some(key) => self.get_type(key)?,
                None => Type::ConstantInt(next_index),
            };
            match &key {
                Type::ConstantInt(i) => next_index = next_index.max(*i + 1),
                Type::ConstantString(_) => {}
                _ => constant = false,
            }
            let value = self.get_type(&item.value)?;
            match keys.iter().position(|k| *k == key) {
                Some(existing) => values[existing] = value,
                None => {
                    keys.push(key);
                    values.push(value);
                }
            }
        }

        if constant {
            Ok(Type::ConstantArray(ConstantArrayType { keys, values }))
        } else {
            Ok(Type::array(Type::union(keys), Type::union(values)))
        }
    }

    fn concat_type(&self, left: &Expr, right: &Expr) -> CheckResult<Type> {
        let (left, right) = (self.get_type(left)?, self.get_type(right)?);
        let (l, r) = (literal_strings(&left), literal_strings(&right));
        if l.is_empty() || r.is_empty() || l.len() * r.len() > MAX_DQL_CANDIDATES {
            return Ok(Type::String);
        }
        Ok(Type::union(l.iter().flat_map(|a| {
            r.iter().map(move |b| Type::constant_string(format!("{a}{b}")))
        })))
    }

    fn method_call_type(&self, call: &MethodCall) -> CheckResult<Type> {
        let MethodName::Identifier(name) = &call.name else {
            return Ok(Type::Mixed);
        };
        let receiver = self.get_type(&call.receiver)?;
        let args = call
            .args
            .iter()
            .map(|a| self.get_type(a))
            .collect::<CheckResult<Vec<_>>>()?;

        match &receiver {
            Type::Union(members) => {
                let mut out = Vec::with_capacity(members.len());
                for member in members {
                    out.push(self.call_on(member, name, &args)?);
                }
                Ok(Type::union(out))
            }
            single => self.call_on(single, name, &args),
        }
    }

    fn call_on(&self, receiver: &Type, method: &str, args: &[Type]) -> CheckResult<Type> {
        match receiver {
            Type::QueryBuilder(state) => builder_call_type(state, method, args),
            Type::Object(object) => Ok(self.object_call_type(object, method, args)),
            _ => Ok(Type::Mixed),
        }
    }

    fn object_call_type(&self, object: &ObjectType, method: &str, args: &[Type]) -> Type {
        let lower = method.to_ascii_lowercase();

        if self.descends_from(object, QUERY_BUILDER_CLASS) {
            // A builder whose beginning we never saw stays opaque.
            return match lower.as_str() {
                "getdql" => Type::String,
                "getquery" => Type::object(QUERY_CLASS),
                "expr" => Type::object(EXPR_CLASS),
                _ if BuilderMethod::from_name(method).is_some() => Type::object(QUERY_BUILDER_CLASS),
                _ => Type::Mixed,
            };
        }

        if self.descends_from(object, OBJECT_MANAGER_INTERFACE) {
            if lower == "createquerybuilder" {
                return Type::QueryBuilder(BuilderState::new());
            }
            if let Some(ty) = entity_manager_method_type(method, args) {
                return ty;
            }
        }

        if lower == "createquerybuilder" && self.descends_from(object, ENTITY_REPOSITORY_CLASS) {
            return self.repository_builder(object, args);
        }

        self.reflection
            .method_return_type(object, method)
            .unwrap_or(Type::Mixed)
    }

    /// `$repository->createQueryBuilder($alias, $indexBy = null)` starts with
    /// `select($alias)->from(<entity>, $alias, $indexBy)`.
    fn repository_builder(&self, repository: &ObjectType, args: &[Type]) -> Type {
        let entity = self.reflection.repository_entity(repository);
        let (Some(entity), Some(alias)) = (entity, args.first()) else {
            return Type::object(QUERY_BUILDER_CLASS);
        };
        let Some(entity_class) = entity.class_name() else {
            return Type::object(QUERY_BUILDER_CLASS);
        };

        let mut from_args = vec![Type::constant_string(entity_class), alias.clone()];
        if let Some(index_by) = args.get(1) {
            from_args.push(index_by.clone());
        }
        let state = BuilderState::new()
            .with_call(BuilderMethod::Select, vec![alias.clone()])
            .with_call(BuilderMethod::From, from_args);
        Type::QueryBuilder(state)
    }

    fn descends_from(&self, object: &ObjectType, ancestor: &str) -> bool {
        self.reflection.ancestor_type(object, ancestor).is_some()
    }

    fn property_fetch_type(&self, object: &Expr, name: &str) -> CheckResult<Type> {
        let object = self.get_type(object)?;
        let Some(class) = object.class_name() else {
            return Ok(Type::Mixed);
        };
        Ok(self
            .reflection
            .property_type(class, name)
            .unwrap_or(Type::Mixed))
    }
}

impl Scope for FlowScope<'_> {
    fn get_type(&self, expr: &Expr) -> CheckResult<Type> {
        Ok(match expr {
            Expr::Null => Type::Null,
            Expr::Bool(b) => Type::ConstantBool(*b),
            Expr::Int(i) => Type::ConstantInt(*i),
            Expr::String(s) => Type::constant_string(s.clone()),
            Expr::ClassConst(class) => Type::constant_string(class.clone()),
            Expr::Array(items) => self.array_type(items)?,
            Expr::Variable(name) => self.variables.get(name).cloned().unwrap_or(Type::Mixed),
            Expr::This => match self.class {
                Some(class) => Type::object(class.name()),
                None => Type::Mixed,
            },
            Expr::New { class, .. } => Type::object(class.clone()),
            Expr::PropertyFetch { object, name } => self.property_fetch_type(object, name)?,
            Expr::MethodCall(call) => self.method_call_type(call)?,
            Expr::Concat(left, right) => self.concat_type(left, right)?,
            Expr::Call { .. } => Type::Mixed,
        })
    }

    fn class_reflection(&self) -> Option<&ClassReflection> {
        self.class
    }

    fn reflection(&self) -> &ReflectionProvider {
        self.reflection
    }
}

fn builder_call_type(state: &BuilderState, method: &str, args: &[Type]) -> CheckResult<Type> {
    if let Some(builder_method) = BuilderMethod::from_name(method) {
        return Ok(Type::QueryBuilder(state.with_call(builder_method, args.to_vec())));
    }
    Ok(match method.to_ascii_lowercase().as_str() {
        "getdql" => match state.dql_candidates()? {
            Some(candidates) => Type::union(candidates.into_iter().map(Type::constant_string)),
            None => Type::String,
        },
        "getquery" => Type::object(QUERY_CLASS),
        "expr" => Type::object(EXPR_CLASS),
        "getentitymanager" => Type::object(ENTITY_MANAGER_INTERFACE),
        "getrootalias" => Type::String,
        _ => Type::Mixed,
    })
}

fn is_builder(ty: &Type) -> bool {
    match ty {
        Type::QueryBuilder(_) => true,
        Type::Union(members) => members.iter().all(is_builder),
        _ => false,
    }
}

/// String values of a literal type, integers included.
fn literal_strings(ty: &Type) -> Vec<String> {
    match ty {
        Type::ConstantInt(i) => vec![i.to_string()],
        Type::Union(members) if members.iter().all(|m| matches!(m, Type::ConstantInt(_))) => {
            members.iter().flat_map(literal_strings).collect()
        }
        other => other.constant_strings().into_iter().map(str::to_string).collect(),
    }
}

/// For `$var->a()->b()->getQuery()`, the variable and the longest prefix of the
/// chain made only of builder calls (`$var->a()->b()`).
fn builder_chain_root(expr: &Expr) -> Option<(&str, &Expr)> {
    let mut chain = Vec::new();
    let mut current = expr;
    while let Expr::MethodCall(call) = current {
        chain.push(current);
        current = &call.receiver;
    }
    let Expr::Variable(var) = current else {
        return None;
    };

    // Walk outwards from the innermost call while the calls are builder methods.
    let mut prefix = None;
    for link in chain.iter().rev() {
        let is_builder_call = link
            .as_method_call()
            .and_then(|c| c.name.as_identifier())
            .is_some_and(|name| BuilderMethod::from_name(name).is_some());
        if !is_builder_call {
            break;
        }
        prefix = Some(*link);
    }
    prefix.map(|p| (var.as_str(), p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::{ENTITY_MANAGER_CLASS, LEGACY_OBJECT_REPOSITORY_CLASS};

    fn provider() -> ReflectionProvider {
        let mut provider = ReflectionProvider::with_doctrine_stubs();
        provider.register(
            ClassReflection::new("App\\Service")
                .with_property("em", Type::object(ENTITY_MANAGER_CLASS)),
        );
        provider
    }

    fn em() -> Expr {
        Expr::This.prop("em")
    }

    fn dql(scope: &FlowScope<'_>, expr: Expr) -> Type {
        scope.get_type(&expr.call("getDQL", vec![])).unwrap()
    }

    #[test]
    fn test_fluent_chain_dql() {
        let reflection = provider();
        let class = reflection.class("App\\Service");
        let scope = FlowScope::new(&reflection, class);

        let chain = em()
            .call("createQueryBuilder", vec![])
            .call("select", vec![Expr::string("e")])
            .call("from", vec![Expr::class_const("App\\E"), Expr::string("e")]);
        assert_eq!(dql(&scope, chain), Type::constant_string("SELECT e FROM App\\E e"));
    }

    #[test]
    fn test_bare_mutating_calls_advance_variable() {
        let reflection = provider();
        let mut scope = FlowScope::new(&reflection, reflection.class("App\\Service"));

        let stmts = [
            Stmt::assign("qb", em().call("createQueryBuilder", vec![]), 1),
            Stmt::expr(Expr::var("qb").call("select", vec![Expr::string("e")]), 2),
            Stmt::expr(
                Expr::var("qb").call("from", vec![Expr::string("App\\E"), Expr::string("e")]),
                3,
            ),
            Stmt::expr(
                Expr::var("qb")
                    .call("andWhere", vec![Expr::string("e.id = 1")])
                    .call("setMaxResults", vec![Expr::Int(10)])
                    .call("getQuery", vec![]),
                4,
            ),
        ];
        for stmt in &stmts {
            scope.apply(stmt).unwrap();
        }
        assert_eq!(
            dql(&scope, Expr::var("qb")),
            Type::constant_string("SELECT e FROM App\\E e WHERE e.id = 1")
        );
    }

    #[test]
    fn test_branches_merge_into_union() {
        let reflection = provider();
        let mut base = FlowScope::new(&reflection, reflection.class("App\\Service"));
        base.apply(&Stmt::assign(
            "qb",
            em().call("createQueryBuilder", vec![])
                .call("select", vec![Expr::string("e")])
                .call("from", vec![Expr::string("E"), Expr::string("e")]),
            1,
        ))
        .unwrap();

        let mut then_scope = base.clone();
        then_scope
            .apply(&Stmt::expr(
                Expr::var("qb").call("andWhere", vec![Expr::string("e.a = 1")]),
                2,
            ))
            .unwrap();
        let merged = then_scope.merge(&base);

        let ty = dql(&merged, Expr::var("qb"));
        assert_eq!(
            ty.constant_strings(),
            vec!["SELECT e FROM E e WHERE e.a = 1", "SELECT e FROM E e"]
        );
    }

    #[test]
    fn test_repository_query_builder() {
        let reflection = provider();
        let scope = FlowScope::new(&reflection, reflection.class("App\\Service"));
        let repo = em().call("getRepository", vec![Expr::class_const("App\\Post")]);

        assert_eq!(
            scope.get_type(&repo).unwrap(),
            Type::generic(ENTITY_REPOSITORY_CLASS, vec![Type::object("App\\Post")])
        );
        assert_eq!(
            dql(&scope, repo.call("createQueryBuilder", vec![Expr::string("p")])),
            Type::constant_string("SELECT p FROM App\\Post p")
        );
    }

    #[test]
    fn test_legacy_repository_query_builder() {
        let mut reflection = provider();
        reflection.register(
            ClassReflection::new("App\\LegacyPostRepository")
                .extends(ObjectType::new(ENTITY_REPOSITORY_CLASS))
                .extends(ObjectType::generic(
                    LEGACY_OBJECT_REPOSITORY_CLASS,
                    vec![Type::object("App\\Post")],
                )),
        );
        let scope = FlowScope::for_method(
            &reflection,
            None,
            &[Param::new("posts", Type::object("App\\LegacyPostRepository"))],
        );

        assert_eq!(
            dql(&scope, Expr::var("posts").call("createQueryBuilder", vec![Expr::string("p")])),
            Type::constant_string("SELECT p FROM App\\Post p")
        );
    }

    #[test]
    fn test_entity_manager_stubs() {
        let reflection = provider();
        let scope = FlowScope::new(&reflection, reflection.class("App\\Service"));
        let find = em().call("find", vec![Expr::class_const("App\\Post"), Expr::Int(1)]);
        assert_eq!(
            scope.get_type(&find).unwrap(),
            Type::object("App\\Post").add_null()
        );
        let merged = em().call("merge", vec![Expr::New { class: "App\\Post".into(), args: vec![] }]);
        assert_eq!(scope.get_type(&merged).unwrap(), Type::object("App\\Post"));
    }

    #[test]
    fn test_dynamic_argument_and_unknown_beginning() {
        let reflection = provider();
        let scope = FlowScope::for_method(
            &reflection,
            reflection.class("App\\Service"),
            &[
                Param::new("field", Type::String),
                Param::new("qb", Type::object(QUERY_BUILDER_CLASS)),
            ],
        );

        let dynamic = em()
            .call("createQueryBuilder", vec![])
            .call("select", vec![Expr::var("field")]);
        assert_eq!(dql(&scope, dynamic), Type::String);

        let unknown = Expr::var("qb").call("select", vec![Expr::string("e")]);
        assert_eq!(
            scope.get_type(&unknown).unwrap(),
            Type::object(QUERY_BUILDER_CLASS)
        );
    }

    #[test]
    fn test_literal_arrays_and_concat() {
        let reflection = provider();
        let scope = FlowScope::new(&reflection, None);

        let array = Expr::assoc([("id", Expr::Int(1)), ("title", Expr::string("x"))]);
        match scope.get_type(&array).unwrap() {
            Type::ConstantArray(array) => assert_eq!(
                array.keys,
                vec![Type::constant_string("id"), Type::constant_string("title")]
            ),
            other => panic!("expected constant array, got {other:?}"),
        }

        let concat = Expr::string("e.id = ").concat(Expr::Int(3));
        assert_eq!(scope.get_type(&concat).unwrap(), Type::constant_string("e.id = 3"));

        let runtime = Expr::string("e.").concat(Expr::Call { name: "f".into(), args: vec![] });
        assert_eq!(scope.get_type(&runtime).unwrap(), Type::String);
    }
}
