//! File stream benchmarks
//!
//! Measures buffered sequential reads and writes against an in-memory
//! session, isolating stream bookkeeping from network cost.
//!
//! Run with: `cargo bench --bench file_stream_bench`

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use skein_platform::{SkeinError, SkeinResult};
use skein_proto::sftp::{
    FileAccess, FileAttributes, FileHandle, FileOpenFlags, FileStreamConfig, OpenMode,
    SftpFileStream, SftpSession,
};
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;

const FILE_SIZE: usize = 1024 * 1024;

/// Single-file session backed by a byte vector.
struct MemorySession {
    file: Mutex<Vec<u8>>,
    packet_size: u32,
}

impl MemorySession {
    fn new(contents: Vec<u8>, packet_size: u32) -> Self {
        Self {
            file: Mutex::new(contents),
            packet_size,
        }
    }

    fn file(&self) -> SkeinResult<std::sync::MutexGuard<'_, Vec<u8>>> {
        self.file
            .lock()
            .map_err(|_| SkeinError::Protocol("poisoned".into()))
    }
}

#[async_trait]
impl SftpSession for MemorySession {
    async fn open(&self, _path: &str, flags: FileOpenFlags) -> SkeinResult<FileHandle> {
        if flags.contains(FileOpenFlags::TRUNC) {
            self.file()?.clear();
        }
        Ok(FileHandle::new(vec![0, 0, 0, 1]))
    }

    async fn read(&self, _handle: &FileHandle, offset: u64, length: u32) -> SkeinResult<Vec<u8>> {
        let file = self.file()?;
        let start = (offset as usize).min(file.len());
        let end = (start + length as usize).min(file.len());
        Ok(file[start..end].to_vec())
    }

    async fn write(&self, _handle: &FileHandle, offset: u64, data: &[u8]) -> SkeinResult<()> {
        let mut file = self.file()?;
        let end = offset as usize + data.len();
        if file.len() < end {
            file.resize(end, 0);
        }
        file[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    async fn close(&self, _handle: &FileHandle) -> SkeinResult<()> {
        Ok(())
    }

    async fn fstat(&self, _handle: &FileHandle) -> SkeinResult<FileAttributes> {
        Ok(FileAttributes::with_size(self.file()?.len() as u64))
    }

    fn is_open(&self) -> bool {
        true
    }

    fn optimal_read_length(&self, requested: u32) -> u32 {
        requested.min(self.packet_size) - 13
    }

    fn optimal_write_length(&self, requested: u32, handle: &FileHandle) -> u32 {
        requested.min(self.packet_size) - (25 + handle.len() as u32)
    }
}

async fn read_all(session: Arc<MemorySession>, chunk: usize) -> SkeinResult<usize> {
    let mut stream = SftpFileStream::open_with_config(
        session,
        "/bench",
        OpenMode::Open,
        FileAccess::Read,
        FileStreamConfig::with_buffer_size(64 * 1024),
    )
    .await?;

    let mut buf = vec![0u8; chunk];
    let mut total = 0;
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        total += n;
    }
    stream.close().await?;
    Ok(total)
}

async fn write_all(session: Arc<MemorySession>, data: &[u8], chunk: usize) -> SkeinResult<()> {
    let mut stream = SftpFileStream::open_with_config(
        session,
        "/bench",
        OpenMode::Create,
        FileAccess::Write,
        FileStreamConfig::with_buffer_size(64 * 1024),
    )
    .await?;

    for piece in data.chunks(chunk) {
        stream.write(piece).await?;
    }
    stream.close().await
}

/// Benchmark sequential reads with varying caller buffer sizes
fn bench_sequential_read(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let contents: Vec<u8> = (0..FILE_SIZE).map(|i| i as u8).collect();

    let mut group = c.benchmark_group("sequential_read");
    group.throughput(Throughput::Bytes(FILE_SIZE as u64));

    for chunk in [512usize, 4096, 65536] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.to_async(&rt).iter(|| {
                let session = Arc::new(MemorySession::new(contents.clone(), 32 * 1024));
                async move { black_box(read_all(session, chunk).await.unwrap()) }
            });
        });
    }

    group.finish();
}

/// Benchmark sequential writes with varying caller buffer sizes
fn bench_sequential_write(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let data: Vec<u8> = (0..FILE_SIZE).map(|i| i as u8).collect();

    let mut group = c.benchmark_group("sequential_write");
    group.throughput(Throughput::Bytes(FILE_SIZE as u64));

    for chunk in [512usize, 4096, 65536] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.to_async(&rt).iter(|| {
                let session = Arc::new(MemorySession::new(Vec::with_capacity(FILE_SIZE), 32 * 1024));
                let data = &data;
                async move { write_all(session, data, chunk).await.unwrap() }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sequential_read, bench_sequential_write);
criterion_main!(benches);
