use crate::cli::DqlCheckArgs;
use ormcheck::{CheckError, MetadataQueryCompiler, QueryCompiler};
use std::io::Read;
use std::sync::Arc;

pub fn run(args: DqlCheckArgs) -> anyhow::Result<()> {
    let config = crate::load_config(&args.config, args.mapping.as_deref())?;
    let gateway = config.metadata_gateway();
    if !gateway.is_configured() {
        return Err(CheckError::configuration(
            "Please provide the `metadata.mapping` setting for the DQL validation.",
        )
        .into());
    }
    // Surface an unreadable mapping once, before any statement is compiled.
    gateway.store()?;
    let compiler = MetadataQueryCompiler::new(Arc::new(gateway));

    let mut inputs = Vec::new();
    if args.files.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| anyhow::anyhow!("failed to read stdin: {e}"))?;
        if buf.trim().is_empty() {
            anyhow::bail!("no DQL provided (pass files or pipe DQL to stdin)");
        }
        inputs.push(("stdin".to_string(), buf));
    } else {
        for file in &args.files {
            let content = std::fs::read_to_string(file)
                .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;
            inputs.push((file.display().to_string(), content));
        }
    }

    let mut had_error = false;
    for (name, content) in &inputs {
        let statements = split_statements(content);
        if statements.is_empty() {
            anyhow::bail!("no DQL statements found in {name}");
        }
        for (idx, dql) in statements.iter().enumerate() {
            let header = format!("{name}:stmt{}", idx + 1);
            if let Err(e) = check_statement(&compiler, &header, dql) {
                had_error = true;
                eprintln!("[ERROR] {header}: {e}");
            }
        }
    }

    if had_error {
        anyhow::bail!("dql check failed");
    }
    Ok(())
}

fn check_statement(compiler: &dyn QueryCompiler, header: &str, dql: &str) -> Result<(), ormcheck::CompileError> {
    let compiled = compiler.compile(dql)?;
    match &compiled.sql {
        Some(sql) => tracing::debug!(target: "ormcheck.cli", header, sql = %sql, "compiled"),
        None => tracing::debug!(target: "ormcheck.cli", header, "compiled without SQL form"),
    }
    Ok(())
}

/// Split on `;` outside of string literals; blank statements are dropped.
fn split_statements(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_string = false;

    for c in input.chars() {
        match c {
            '\'' => {
                in_string = !in_string;
                current.push(c);
            }
            ';' if !in_string => {
                push_statement(&mut out, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_statement(&mut out, &current);
    out
}

fn push_statement(out: &mut Vec<String>, statement: &str) {
    let trimmed = statement.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_string_literals() {
        let stmts = split_statements(
            "SELECT u FROM User u WHERE u.name = 'a;b';\n\n  DELETE Post p ;; SELECT 'it''s;' FROM X x",
        );
        assert_eq!(
            stmts,
            vec![
                "SELECT u FROM User u WHERE u.name = 'a;b'",
                "DELETE Post p",
                "SELECT 'it''s;' FROM X x",
            ]
        );
    }

    #[test]
    fn split_empty_input() {
        assert!(split_statements("  ;\n; ").is_empty());
    }
}
