use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
    /// Entries directly under `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

pub struct NativeStorage;

impl NativeStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for NativeStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let path = Path::new(prefix);
        let mut entries = Vec::new();

        if path.is_dir() {
            let mut dir = tokio::fs::read_dir(path).await?;
            while let Some(entry) = dir.next_entry().await? {
                entries.push(entry.path().to_string_lossy().to_string());
            }
        } else if path.exists() {
            entries.push(prefix.to_string());
        }

        entries.sort();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parents_and_lists_sorted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("out");
        let root_str = root.to_string_lossy().to_string();
        let storage = NativeStorage::new();

        storage.write(&format!("{}/b.wav", root_str), b"B").await?;
        storage.write(&format!("{}/a.wav", root_str), b"A").await?;

        let listed = storage.list(&root_str).await?;
        assert_eq!(listed.len(), 2);
        assert!(listed[0].ends_with("a.wav"));
        assert!(listed[1].ends_with("b.wav"));
        assert_eq!(storage.read(&listed[1]).await?, b"B");
        Ok(())
    }

    #[tokio::test]
    async fn test_exists_and_list_single_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("x.txt").to_string_lossy().to_string();
        let storage = NativeStorage::new();

        assert!(!storage.exists(&file).await?);
        assert!(storage.list(&file).await?.is_empty());
        storage.write(&file, b"x").await?;
        assert!(storage.exists(&file).await?);
        assert_eq!(storage.list(&file).await?, vec![file.clone()]);
        Ok(())
    }
}
