use tracing::{debug, trace};

/// Reads a `.json` file from `path`.
pub async fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    trace!("reading file path: {path}");
    let file = tokio::fs::read(path).await?;
    trace!("file read; deserializing bytes ...");
    let data: T = serde_json::from_slice(&file)?;
    Ok(data)
}

/// Writes `data` as pretty `.json` to `path`, creating parent directories as necessary.
pub async fn write_json<T: serde::Serialize>(path: &str, data: &T) -> anyhow::Result<()> {
    ensure_parent(path).await?;
    let bytes = serde_json::to_vec_pretty(data)?;
    tokio::fs::write(path, bytes).await?;
    debug!("json written to {path}");
    Ok(())
}

/// Ensure the directory containing `path` exists.
pub async fn ensure_parent(path: &str) -> std::io::Result<()> {
    if let Some(dir) = std::path::Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            trace!("checking directory path: {:?}", dir);
            tokio::fs::create_dir_all(dir).await?;
        }
    }
    Ok(())
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[tokio::test]
async fn json_survives_a_write_and_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/state.json");
    let path = path.to_str().unwrap();

    let mut data = std::collections::BTreeMap::new();
    data.insert("session".to_string(), "abc".to_string());
    write_json(path, &data).await.unwrap();

    let back: std::collections::BTreeMap<String, String> = read_json(path).await.unwrap();
    assert_eq!(back, data);
}
