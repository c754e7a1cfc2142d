//! Reference host engine.
//!
//! [`Analyser`] registers the classes of the analysed sources next to the
//! built-in persistence declarations, then walks every class: declared
//! properties first, then method bodies statement by statement. Each property
//! and each method call is handed to the rules observing that kind of node.

use crate::ast::{ClassDecl, Expr, SourceFile, Stmt, StmtKind};
use crate::config::AnalysisConfig;
use crate::error::{CheckError, CheckResult};
use crate::reflection::{ClassReflection, ReflectionProvider};
use crate::rules::{Node, RuleRegistry};
use crate::scope::FlowScope;
use serde::Serialize;
use std::fmt;

/// One message reported by a rule, with where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub rule: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.message)
    }
}

pub struct Analyser {
    reflection: ReflectionProvider,
    rules: RuleRegistry,
}

impl Analyser {
    pub fn new(rules: RuleRegistry) -> Self {
        Self {
            reflection: ReflectionProvider::with_doctrine_stubs(),
            rules,
        }
    }

    /// Analyser running the built-in rules as configured.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(RuleRegistry::from_config(config))
    }

    pub fn reflection(&self) -> &ReflectionProvider {
        &self.reflection
    }

    /// Make a class known without analysing it (vendor code, for instance).
    pub fn register_class(&mut self, class: ClassReflection) {
        self.reflection.register(class);
    }

    /// Make the classes declared in `file` known to later analyses.
    pub fn register_source(&mut self, file: &SourceFile) {
        for class in &file.classes {
            self.reflection.register(ClassReflection::from_decl(class));
        }
    }

    /// Register every file, then analyse them in order.
    pub fn analyse_all(&mut self, files: &[SourceFile]) -> CheckResult<Vec<Diagnostic>> {
        for file in files {
            self.register_source(file);
        }
        let mut diagnostics = Vec::new();
        for file in files {
            diagnostics.extend(self.analyse(file)?);
        }
        Ok(diagnostics)
    }

    /// Run the rules over one file whose classes are already registered.
    ///
    /// Stops at the first configuration error.
    pub fn analyse(&self, file: &SourceFile) -> CheckResult<Vec<Diagnostic>> {
        let mut walk = Walk {
            rules: &self.rules,
            file: &file.path,
            diagnostics: Vec::new(),
        };
        for class in &file.classes {
            walk.class(&self.reflection, class)?;
        }
        tracing::debug!(
            target: "ormcheck.rules",
            file = %file.path,
            diagnostics = walk.diagnostics.len(),
            "analysed file"
        );
        Ok(walk.diagnostics)
    }
}

struct Walk<'r> {
    rules: &'r RuleRegistry,
    file: &'r str,
    diagnostics: Vec<Diagnostic>,
}

impl Walk<'_> {
    fn class(&mut self, reflection: &ReflectionProvider, class: &ClassDecl) -> CheckResult<()> {
        let class_reflection = reflection.class(&class.name);

        let scope = FlowScope::new(reflection, class_reflection);
        for property in &class.properties {
            self.visit(Node::Property(property), property.line, &scope)?;
        }

        for method in &class.methods {
            let mut scope = FlowScope::for_method(reflection, class_reflection, &method.params);
            self.block(&method.body, &mut scope)?;
        }
        Ok(())
    }

    /// Walk `stmts` in order; `true` when every path through them returns.
    fn block(&mut self, stmts: &[Stmt], scope: &mut FlowScope<'_>) -> CheckResult<bool> {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Expr(expr) | StmtKind::Assign { value: expr, .. } => {
                    self.calls(expr, stmt.line, scope)?;
                    apply(scope, stmt)?;
                }
                StmtKind::Return(expr) => {
                    if let Some(expr) = expr {
                        self.calls(expr, stmt.line, scope)?;
                    }
                    // Nothing after a return is reachable.
                    return Ok(true);
                }
                StmtKind::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    self.calls(condition, stmt.line, scope)?;
                    apply(scope, stmt)?;
                    let mut then_scope = scope.clone();
                    let then_returns = self.block(then_branch, &mut then_scope)?;
                    let mut else_scope = scope.clone();
                    let else_returns = self.block(else_branch, &mut else_scope)?;
                    // Only branches that fall through reach the next statement.
                    *scope = match (then_returns, else_returns) {
                        (true, true) => return Ok(true),
                        (true, false) => else_scope,
                        (false, true) => then_scope,
                        (false, false) => then_scope.merge(&else_scope),
                    };
                }
            }
        }
        Ok(false)
    }

    fn calls(&mut self, expr: &Expr, line: u32, scope: &FlowScope<'_>) -> CheckResult<()> {
        for call in expr.method_calls() {
            self.visit(Node::MethodCall(call), line, scope)?;
        }
        Ok(())
    }

    fn visit(&mut self, node: Node<'_>, line: u32, scope: &FlowScope<'_>) -> CheckResult<()> {
        for rule in self.rules.rules_for(node.kind()) {
            match rule.process_node(node, scope) {
                Ok(messages) => {
                    self.diagnostics
                        .extend(messages.into_iter().map(|message| Diagnostic {
                            file: self.file.to_string(),
                            line,
                            rule: rule.name().to_string(),
                            message,
                        }));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::debug!(target: "ormcheck.rules", rule = rule.name(), error = %e, "rule failed");
                }
            }
        }
        Ok(())
    }
}

/// Advance the scope past `stmt`; inference failures leave it unchanged.
fn apply(scope: &mut FlowScope<'_>, stmt: &Stmt) -> CheckResult<()> {
    match scope.apply(stmt) {
        Err(e @ CheckError::Configuration(_)) => Err(e),
        Err(e) => {
            tracing::trace!(target: "ormcheck.rules", line = stmt.line, error = %e, "statement not applied");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
