//! # Folio CLI
//!
//! Usage:
//!   folio template.json model.json -o document.json
//!   folio template.json model.json --text
//!   echo '{ ... }' | folio template.json --options options.json
//!   folio --example > template.json
//!
//! With one positional argument the model is read from stdin. Set
//! `RUST_LOG=debug` to see skipped payload entries.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use folio::render::PlainText;
use folio::{BindOptions, Binder, FolioError};

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_template_json());
        return;
    }

    let flag_value = |flag: &str| {
        args.windows(2)
            .find(|w| w[0] == flag)
            .map(|w| w[1].clone())
    };
    let output_path = flag_value("-o");
    let options_path = flag_value("--options");
    let as_text = args.iter().any(|a| a == "--text");

    // Positional arguments, skipping flag values.
    let mut positional = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "-o" || arg == "--options" {
            iter.next();
        } else if !arg.starts_with('-') {
            positional.push(arg.as_str());
        }
    }

    let Some(template_path) = positional.first() else {
        eprintln!("Usage: folio <template.json> [model.json] [-o out.json] [--text] [--options opts.json]");
        process::exit(2);
    };
    let template_json = read_or_exit(template_path);
    let model_json = match positional.get(1) {
        Some(path) => read_or_exit(path),
        None => {
            let mut buf = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buf) {
                fail("Failed to read stdin", e);
            }
            buf
        }
    };

    let options = match options_path {
        Some(path) => match serde_json::from_str::<BindOptions>(&read_or_exit(&path)) {
            Ok(options) => options,
            Err(e) => fail("Failed to parse options", FolioError::from(e)),
        },
        None => BindOptions::default(),
    };

    let document = match bind(&template_json, &model_json, options) {
        Ok(document) => document,
        Err(e) => fail("Failed to bind template", e),
    };

    let output = if as_text {
        PlainText::render(&document)
    } else {
        match folio::dump_json(&document) {
            Ok(json) => json,
            Err(e) => fail("Failed to write document", e),
        }
    };

    match output_path {
        Some(path) => match fs::write(&path, &output) {
            Ok(()) => eprintln!("✓ Written {} bytes to {}", output.len(), path),
            Err(e) => fail("Failed to write output", e),
        },
        None => println!("{}", output),
    }
}

fn bind(
    template_json: &str,
    model_json: &str,
    options: BindOptions,
) -> folio::Result<folio::DocNode> {
    let template = folio::load_template(template_json)?;
    let model: serde_json::Value = serde_json::from_str(model_json)?;
    Binder::with_options(options).bind_document(&template, &model)
}

fn read_or_exit(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => fail(&format!("Failed to read {}", path), e),
    }
}

fn fail(context: &str, error: impl std::fmt::Display) -> ! {
    eprintln!("✗ {}: {}", context, error);
    process::exit(1);
}

fn example_template_json() -> &'static str {
    r##"{
  "$type": "document",
  "contents": [
    {
      "$type": "paragraph",
      "spans": [
        { "$type": "span", "value": "Invoice " },
        { "$type": "span", "access": "number" }
      ],
      "$styles": { "fontsize": { "value": 20.0 } }
    },
    {
      "$type": "show",
      "condition": "paid",
      "contents": [
        { "$type": "paragraph", "spans": [ { "$type": "span", "value": "PAID" } ] }
      ]
    },
    {
      "$type": "table",
      "headers": [
        {
          "$type": "tablerow",
          "cells": [
            { "$type": "tablecell", "element": { "$type": "span", "value": "Group" } },
            { "$type": "tablecell", "element": { "$type": "span", "value": "Item" } },
            { "$type": "tablecell", "element": { "$type": "span", "value": "Amount" } }
          ]
        }
      ],
      "rows": [
        {
          "$type": "tablerow",
          "access": "items",
          "cells": [
            {
              "$type": "tablecell",
              "access": "group",
              "autorowspan": true,
              "element": { "$type": "span" }
            },
            {
              "$type": "tablecell",
              "access": "name",
              "element": { "$type": "span", "value": "" }
            },
            {
              "$type": "tablecell",
              "access": "amount",
              "element": { "$type": "span", "format": "{0:0.00}" }
            }
          ]
        }
      ]
    },
    {
      "$type": "paragraph",
      "spans": [ { "$type": "span", "access": "note", "value": "" } ]
    }
  ]
}
"##
}
