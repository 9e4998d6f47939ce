use std::path::Path;

use driftmgr_core::{
    DependencyBlock, GenerateBlock, IncludeBlock, RemoteStateConfig, RemoteStateGenerate,
    TerragruntConfig,
};
use hcl::structure::{Block, BlockLabel, Structure};
use tracing::{debug, warn};

use crate::error::HclError;
use crate::eval::{as_bool, as_flat_string_map, as_string, as_string_list, eval_expr};

/// Parse a `terragrunt.hcl` file's contents into a [`TerragruntConfig`].
///
/// Unknown top-level blocks are ignored with a warning (spec §4.6); this
/// function never panics on malformed input — HCL syntax errors surface as
/// an [`HclError::Parse`] naming the offending file.
pub fn parse_terragrunt_hcl(content: &str, path: &Path) -> Result<TerragruntConfig, HclError> {
    let body: hcl::Body = hcl::parse(content).map_err(|source| HclError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    let mut config = TerragruntConfig::default();
    let mut warnings: Vec<String> = Vec::new();

    for structure in body {
        match structure {
            Structure::Block(block) => parse_block(block, &mut config, &mut warnings, path),
            Structure::Attribute(attr) => {
                let value = eval_expr(&attr.expr, &mut warnings);
                match attr.key.as_str() {
                    "inputs" => {
                        if let serde_json::Value::Object(map) = value {
                            config.inputs = map.into_iter().collect();
                        }
                    }
                    "iam_role" => config.iam_role = as_string(&value),
                    "skip" => config.skip = as_bool(&value),
                    "terraform_version_constraint" => {
                        config.terraform_version_constraint = as_string(&value)
                    }
                    other => warnings.push(format!("unknown top-level attribute '{}' ignored", other)),
                }
            }
        }
    }

    for w in &warnings {
        warn!(path = %path.display(), "{}", w);
    }

    Ok(config)
}

fn parse_block(
    block: Block,
    config: &mut TerragruntConfig,
    warnings: &mut Vec<String>,
    path: &Path,
) {
    match block.identifier.as_str() {
        "terraform" => {
            for structure in block.body {
                if let Structure::Attribute(attr) = structure {
                    if attr.key.as_str() == "source" {
                        config.terraform_source = as_string(&eval_expr(&attr.expr, warnings));
                    }
                }
            }
        }
        "remote_state" => {
            config.remote_state = Some(parse_remote_state(block, warnings));
        }
        "include" => {
            config.includes.push(parse_include(block, warnings));
        }
        "dependency" => {
            config.dependency_blocks.push(parse_dependency(block, warnings));
        }
        "dependencies" => {
            for structure in block.body {
                if let Structure::Attribute(attr) = structure {
                    if attr.key.as_str() == "paths" {
                        config
                            .dependency_paths
                            .extend(as_string_list(&eval_expr(&attr.expr, warnings)));
                    }
                }
            }
        }
        "generate" => {
            let generate = parse_generate(&block, warnings);
            config
                .generate_blocks
                .insert(generate.name.clone(), generate);
        }
        "locals" => {
            for structure in block.body {
                if let Structure::Attribute(attr) = structure {
                    config
                        .locals
                        .insert(attr.key.to_string(), eval_expr(&attr.expr, warnings));
                }
            }
        }
        other => {
            debug!(path = %path.display(), block = other, "unknown block ignored");
            warnings.push(format!("unknown block '{}' ignored", other));
        }
    }
}

fn block_label(block: &Block, index: usize) -> Option<String> {
    block.labels.get(index).map(label_str)
}

fn label_str(label: &BlockLabel) -> String {
    match label {
        BlockLabel::String(s) => s.clone(),
        BlockLabel::Identifier(ident) => ident.to_string(),
    }
}

fn parse_remote_state(block: Block, warnings: &mut Vec<String>) -> RemoteStateConfig {
    let mut remote = RemoteStateConfig::default();
    for structure in block.body {
        match structure {
            Structure::Attribute(attr) if attr.key.as_str() == "backend" => {
                remote.backend = as_string(&eval_expr(&attr.expr, warnings)).unwrap_or_default();
            }
            Structure::Block(inner) if inner.identifier.as_str() == "config" => {
                for s in inner.body {
                    if let Structure::Attribute(attr) = s {
                        remote
                            .config
                            .insert(attr.key.to_string(), eval_expr(&attr.expr, warnings));
                    }
                }
            }
            Structure::Block(inner) if inner.identifier.as_str() == "generate" => {
                let mut path = String::new();
                let mut if_exists = String::new();
                for s in inner.body {
                    if let Structure::Attribute(attr) = s {
                        let v = as_string(&eval_expr(&attr.expr, warnings)).unwrap_or_default();
                        match attr.key.as_str() {
                            "path" => path = v,
                            "if_exists" => if_exists = v,
                            _ => {}
                        }
                    }
                }
                remote.generate = Some(RemoteStateGenerate { path, if_exists });
            }
            _ => {}
        }
    }
    remote
}

fn parse_include(block: Block, warnings: &mut Vec<String>) -> IncludeBlock {
    let name = block_label(&block, 0);
    let mut path = String::new();
    let mut expose = false;
    let mut merge_strategy = None;
    for structure in block.body {
        if let Structure::Attribute(attr) = structure {
            let value = eval_expr(&attr.expr, warnings);
            match attr.key.as_str() {
                "path" => path = as_string(&value).unwrap_or_default(),
                "expose" => expose = as_bool(&value),
                "merge_strategy" => merge_strategy = as_string(&value),
                _ => {}
            }
        }
    }
    IncludeBlock { name, path, expose, merge_strategy }
}

fn parse_dependency(block: Block, warnings: &mut Vec<String>) -> DependencyBlock {
    let name = block_label(&block, 0).unwrap_or_default();
    let mut config_path = String::new();
    let mut mock_outputs = std::collections::HashMap::new();
    let mut mock_outputs_merge_with_state = None;
    let mut skip = false;
    for structure in block.body {
        if let Structure::Attribute(attr) = structure {
            let value = eval_expr(&attr.expr, warnings);
            match attr.key.as_str() {
                "config_path" => config_path = as_string(&value).unwrap_or_default(),
                "mock_outputs" => mock_outputs = as_flat_string_map(&value),
                "mock_outputs_merge_with_state" => {
                    mock_outputs_merge_with_state = as_string(&value)
                }
                "skip" => skip = as_bool(&value),
                _ => {}
            }
        }
    }
    DependencyBlock {
        name,
        config_path,
        mock_outputs,
        mock_outputs_merge_with_state,
        skip,
    }
}

fn parse_generate(block: &Block, warnings: &mut Vec<String>) -> GenerateBlock {
    let name = block_label(block, 0).unwrap_or_default();
    let mut path = String::new();
    let mut if_exists = String::new();
    let mut contents = String::new();
    for structure in block.body.iter() {
        if let Structure::Attribute(attr) = structure {
            let value = eval_expr(&attr.expr, warnings);
            match attr.key.as_str() {
                "path" => path = as_string(&value).unwrap_or_default(),
                "if_exists" => if_exists = as_string(&value).unwrap_or_default(),
                "contents" => contents = as_string(&value).unwrap_or_default(),
                _ => {}
            }
        }
    }
    GenerateBlock { name, path, if_exists, contents }
}

/// Parse a `terragrunt.hcl` file at `path` from disk.
pub fn load_terragrunt_file(path: &Path) -> Result<TerragruntConfig, HclError> {
    let content = std::fs::read_to_string(path).map_err(|e| HclError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_terragrunt_hcl(&content, path)
}
