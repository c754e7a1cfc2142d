//! Minimal syntax tree consumed by the analyser.
//!
//! Only the constructs the checks observe are modelled: literals, variables,
//! property fetches, method calls and a handful of statements. Everything
//! else is represented by [`Expr::Call`], which infers to `mixed`.

use crate::types::{ObjectType, Type};

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MethodName {
    Identifier(String),
    /// `$obj->$name()`
    Dynamic(Box<Expr>),
}

impl MethodName {
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            MethodName::Identifier(name) => Some(name),
            MethodName::Dynamic(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub receiver: Box<Expr>,
    pub name: MethodName,
    pub args: Vec<Expr>,
}

impl MethodCall {
    /// The same receiver with a different method and no arguments.
    pub fn with_name(&self, name: &str) -> MethodCall {
        MethodCall {
            receiver: self.receiver.clone(),
            name: MethodName::Identifier(name.to_string()),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    Array(Vec<ArrayItem>),
    Variable(String),
    This,
    /// `Foo::class`
    ClassConst(String),
    New {
        class: String,
        args: Vec<Expr>,
    },
    PropertyFetch {
        object: Box<Expr>,
        name: String,
    },
    MethodCall(MethodCall),
    Concat(Box<Expr>, Box<Expr>),
    /// A function call the analyser knows nothing about.
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Variable(name.into())
    }

    pub fn string(value: impl Into<String>) -> Expr {
        Expr::String(value.into())
    }

    pub fn class_const(class: impl Into<String>) -> Expr {
        Expr::ClassConst(class.into())
    }

    /// `['key' => value, ...]`
    pub fn assoc<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Expr)>) -> Expr {
        Expr::Array(
            pairs
                .into_iter()
                .map(|(k, v)| ArrayItem {
                    key: Some(Expr::String(k.into())),
                    value: v,
                })
                .collect(),
        )
    }

    /// `[value, ...]`
    pub fn list(values: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Array(
            values
                .into_iter()
                .map(|value| ArrayItem { key: None, value })
                .collect(),
        )
    }

    pub fn prop(self, name: impl Into<String>) -> Expr {
        Expr::PropertyFetch {
            object: Box::new(self),
            name: name.into(),
        }
    }

    pub fn call(self, name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::MethodCall(MethodCall {
            receiver: Box::new(self),
            name: MethodName::Identifier(name.into()),
            args,
        })
    }

    pub fn call_dynamic(self, name: Expr, args: Vec<Expr>) -> Expr {
        Expr::MethodCall(MethodCall {
            receiver: Box::new(self),
            name: MethodName::Dynamic(Box::new(name)),
            args,
        })
    }

    pub fn concat(self, other: Expr) -> Expr {
        Expr::Concat(Box::new(self), Box::new(other))
    }

    pub fn as_method_call(&self) -> Option<&MethodCall> {
        match self {
            Expr::MethodCall(call) => Some(call),
            _ => None,
        }
    }

    /// Method calls within this expression, innermost receivers and arguments
    /// before the call that uses them.
    pub fn method_calls(&self) -> Vec<&MethodCall> {
        let mut out = Vec::new();
        self.collect_calls(&mut out);
        out
    }

    fn collect_calls<'a>(&'a self, out: &mut Vec<&'a MethodCall>) {
        match self {
            Expr::MethodCall(call) => {
                call.receiver.collect_calls(out);
                if let MethodName::Dynamic(name) = &call.name {
                    name.collect_calls(out);
                }
                for arg in &call.args {
                    arg.collect_calls(out);
                }
                out.push(call);
            }
            Expr::Array(items) => {
                for item in items {
                    if let Some(key) = &item.key {
                        key.collect_calls(out);
                    }
                    item.value.collect_calls(out);
                }
            }
            Expr::New { args, .. } | Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_calls(out);
                }
            }
            Expr::PropertyFetch { object, .. } => object.collect_calls(out),
            Expr::Concat(left, right) => {
                left.collect_calls(out);
                right.collect_calls(out);
            }
            Expr::Null
            | Expr::Bool(_)
            | Expr::Int(_)
            | Expr::String(_)
            | Expr::Variable(_)
            | Expr::This
            | Expr::ClassConst(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Assign {
        var: String,
        value: Expr,
    },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    Return(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
}

impl Stmt {
    pub fn expr(expr: Expr, line: u32) -> Stmt {
        Stmt {
            kind: StmtKind::Expr(expr),
            line,
        }
    }

    pub fn assign(var: impl Into<String>, value: Expr, line: u32) -> Stmt {
        Stmt {
            kind: StmtKind::Assign {
                var: var.into(),
                value,
            },
            line,
        }
    }

    pub fn if_else(condition: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt>, line: u32) -> Stmt {
        Stmt {
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            line,
        }
    }

    pub fn ret(expr: Option<Expr>, line: u32) -> Stmt {
        Stmt {
            kind: StmtKind::Return(expr),
            line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Type,
    pub body: Vec<Stmt>,
    pub line: u32,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>, line: u32) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: Type::Mixed,
            body: Vec::new(),
            line,
        }
    }

    pub fn param(mut self, name: &str, ty: Type) -> Self {
        self.params.push(Param::new(name, ty));
        self
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.return_type = ty;
        self
    }

    pub fn body(mut self, body: Vec<Stmt>) -> Self {
        self.body = body;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    pub readable_type: Type,
    pub writable_type: Type,
    pub line: u32,
}

impl PropertyDecl {
    pub fn new(name: impl Into<String>, ty: Type, line: u32) -> Self {
        Self {
            name: name.into(),
            readable_type: ty.clone(),
            writable_type: ty,
            line,
        }
    }

    /// A property whose write type differs from its read type.
    pub fn asymmetric(name: impl Into<String>, readable: Type, writable: Type, line: u32) -> Self {
        Self {
            name: name.into(),
            readable_type: readable,
            writable_type: writable,
            line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub is_interface: bool,
    pub is_final: bool,
    pub template_types: Vec<String>,
    pub parents: Vec<ObjectType>,
    pub properties: Vec<PropertyDecl>,
    pub methods: Vec<MethodDecl>,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_interface: false,
            is_final: false,
            template_types: Vec::new(),
            parents: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: ObjectType) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn property(mut self, property: PropertyDecl) -> Self {
        self.properties.push(property);
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: String,
    pub classes: Vec<ClassDecl>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, classes: Vec<ClassDecl>) -> Self {
        Self {
            path: path.into(),
            classes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_calls_are_receiver_first() {
        let expr = Expr::var("qb")
            .call("select", vec![Expr::string("e")])
            .call("getQuery", vec![]);
        let names: Vec<_> = expr
            .method_calls()
            .iter()
            .filter_map(|c| c.name.as_identifier())
            .collect();
        assert_eq!(names, vec!["select", "getQuery"]);
    }

    #[test]
    fn test_calls_inside_arguments_are_visited() {
        let expr = Expr::var("repo").call(
            "findBy",
            vec![Expr::assoc([("id", Expr::var("other").call("getId", vec![]))])],
        );
        assert_eq!(expr.method_calls().len(), 2);
    }
}
