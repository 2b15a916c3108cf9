//! 設定ファイルのJSONスキーマ生成ツール
//!
//! エディタ補完・設定検証用に schema/config.json を出力する。

use anyhow::Context;
use schemars::schema_for;

use BigKahuna::domain::AppConfig;

fn main() -> anyhow::Result<()> {
    let schema = schema_for!(AppConfig);
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;

    std::fs::create_dir_all("schema").context("Failed to create schema directory")?;
    std::fs::write("schema/config.json", json).context("Failed to write schema file")?;

    println!("Wrote schema/config.json");
    Ok(())
}
