use std::collections::HashSet;
use std::path::Path;

use loandoc_structurer::{
    document_stats, emit_files, enumerate_inputs, epoch_ms, load_config, sha256_hex,
    structure_text_with, summarize_edits, EnumerateError, ProposalEdit, StructurerConfig,
    MIME_DOCX, MIME_PDF,
};

fn main() {
    // Simple CLI flags parsing
    let args: Vec<String> = std::env::args().collect();

    let mut input_glob = String::from("./input/**/*.txt");
    if let Some(pos) = args.iter().position(|a| a == "--input") {
        if let Some(val) = args.get(pos + 1) {
            if !val.starts_with("--") {
                input_glob = val.clone();
            }
        }
    }
    let mut outdir = String::from("./out");
    if let Some(pos) = args.iter().position(|a| a == "--out") {
        if let Some(val) = args.get(pos + 1) {
            if !val.starts_with("--") {
                outdir = val.clone();
            }
        }
    }
    // Source kind drives the paragraph-assembly mode
    let mut file_type = String::from("pdf");
    if let Some(pos) = args.iter().position(|a| a == "--file-type") {
        if let Some(val) = args.get(pos + 1) {
            if !val.starts_with("--") {
                file_type = val.clone();
            }
        }
    }
    let mime_type = match file_type.as_str() {
        "pdf" => MIME_PDF,
        "docx" => MIME_DOCX,
        other => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool": "parse_args",
                    "flag": "--file-type",
                    "value": other,
                    "error": "expected pdf or docx",
                    "error_code": 3
                })
            );
            std::process::exit(3);
        }
    };
    let mut edits_path: Option<String> = None;
    if let Some(pos) = args.iter().position(|a| a == "--edits") {
        if let Some(val) = args.get(pos + 1) {
            if !val.starts_with("--") {
                edits_path = Some(val.clone());
            }
        }
    }

    // 1) Load heuristics config (optional overlay)
    let cfg = match args.iter().position(|a| a == "--config") {
        Some(pos) => {
            let path = args.get(pos + 1).cloned().unwrap_or_default();
            match load_config(Path::new(&path)) {
                Ok(c) => {
                    eprintln!(
                        "{}",
                        serde_json::json!({
                            "tool": "load_config",
                            "file": path,
                            "status": "ok"
                        })
                    );
                    c
                }
                Err(e) => {
                    eprintln!(
                        "{}",
                        serde_json::json!({
                            "tool": "load_config",
                            "file": path,
                            "error": e.to_string(),
                            "error_code": 3
                        })
                    );
                    std::process::exit(3);
                }
            }
        }
        None => StructurerConfig::default(),
    };

    // Optional accepted-edits bundle, applied to every structured document
    let edits: Vec<ProposalEdit> = match &edits_path {
        Some(path) => match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()))
        {
            Ok(edits) => edits,
            Err(e) => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "tool": "load_edits",
                        "file": path,
                        "error": e,
                        "error_code": 3
                    })
                );
                std::process::exit(3);
            }
        },
        None => Vec::new(),
    };

    // Track used slugs for uniqueness
    let mut used_doc_ids: HashSet<String> = HashSet::new();

    fn slugify(base: &str) -> String {
        let lower = base.to_lowercase();
        let mut s = String::with_capacity(lower.len());
        for ch in lower.chars() {
            if ch.is_ascii_alphanumeric() {
                s.push(ch);
            } else {
                s.push('-');
            }
        }
        let trimmed = s.trim_matches('-').to_string();
        let mut collapsed = String::with_capacity(trimmed.len());
        let mut prev_dash = false;
        for ch in trimmed.chars() {
            if ch == '-' {
                if !prev_dash {
                    collapsed.push(ch);
                }
                prev_dash = true;
            } else {
                prev_dash = false;
                collapsed.push(ch);
            }
        }
        if collapsed.is_empty() {
            "doc".to_string()
        } else {
            collapsed
        }
    }

    fn unique_slug(slug_in: String, used: &mut HashSet<String>) -> String {
        if !used.contains(&slug_in) {
            used.insert(slug_in.clone());
            return slug_in;
        }
        let mut i = 1;
        loop {
            let candidate = format!("{}-{}", slug_in, i);
            if !used.contains(&candidate) {
                used.insert(candidate.clone());
                return candidate;
            }
            i += 1;
        }
    }

    // 2) Enumerate extracted-text inputs
    let files = match enumerate_inputs(&input_glob) {
        Ok(files) => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool": "enumerate_inputs",
                    "count": files.len(),
                })
            );
            files
        }
        Err(err) => {
            let EnumerateError::NoFilesFound { guidance } = err;
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool": "enumerate_inputs",
                    "error": "NoFilesFound",
                    "error_code": 1
                })
            );
            eprintln!("{}", guidance);
            std::process::exit(1);
        }
    };

    // 3) Structure each file and emit JSON
    for file in files {
        let started_ms = epoch_ms();
        let fname = file
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("doc.txt")
            .to_string();
        let base = fname.trim_end_matches(".txt");
        let doc_id = unique_slug(slugify(base), &mut used_doc_ids);

        let raw_text = match std::fs::read_to_string(&file) {
            Ok(t) => t,
            Err(e) => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "tool": "read_input",
                        "file": file,
                        "error": e.to_string(),
                        "error_code": 1
                    })
                );
                std::process::exit(1);
            }
        };

        let mut document = structure_text_with(&raw_text, &fname, mime_type, &cfg);
        eprintln!(
            "{}",
            serde_json::json!({
                "tool": "structure_text",
                "file": file,
                "sections": document.sections.len(),
                "characters": document.full_text.len()
            })
        );

        if !edits.is_empty() {
            let errors = loandoc_structurer::validate_edits(&document, &edits);
            for err in &errors {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "tool": "validate_edits",
                        "file": file,
                        "warning": err.to_string()
                    })
                );
            }
            document = loandoc_structurer::apply_edits(&document, &edits);
            let summary = summarize_edits(&edits);
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool": "apply_edits",
                    "file": file,
                    "added": summary.added,
                    "modified": summary.modified,
                    "deleted": summary.deleted
                })
            );
        }

        let stats = document_stats(&document);
        let fingerprint = sha256_hex(document.full_text.as_bytes());
        let finished_ms = epoch_ms();

        let meta = serde_json::json!({
            "doc_id": doc_id,
            "file": fname,
            "file_type": mime_type,
            "stats": stats,
            "fingerprint": fingerprint,
            "timestamps": {"started_ms": started_ms, "finished_ms": finished_ms},
        });

        match emit_files(&document, &meta, outdir.as_str(), &doc_id) {
            Ok(paths) => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "tool": "emit_files",
                        "file": file,
                        "doc_path": paths.doc_path,
                        "meta_path": paths.meta_path
                    })
                );
            }
            Err(e) => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "tool": "emit_files",
                        "file": file,
                        "error": e.to_string(),
                        "error_code": 6
                    })
                );
                std::process::exit(6);
            }
        }
    }
}
