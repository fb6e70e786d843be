//! Throughput Benchmark for hayes
//!
//! This benchmark measures the parser, the handler selection and a full
//! command round trip through an in-memory stream.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use hayes::commands::{select, CommandHandler, HandlerRegistry};
use hayes::config::AtServerConfig;
use hayes::protocol::{classify, scan, CommandParser, CommandType, LineBuffer};
use hayes::server::AtServer;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Benchmark line parsing
fn bench_parse(c: &mut Criterion) {
    let parser = CommandParser::new();

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Elements(1));

    group.bench_function("classify_write", |b| {
        b.iter(|| black_box(classify(black_box(b"+CGDCONT=1,\"IP\",\"internet\""))));
    });

    group.bench_function("buffer_with_noise", |b| {
        let mut buffer = LineBuffer::new(512);
        b.iter(|| {
            buffer.clear();
            buffer.append(b"\r\n\x00noise at+cops=0,2,\"26201\"\r\n").unwrap();
            black_box(parser.parse(&mut buffer));
        });
    });

    group.bench_function("scan_arguments", |b| {
        b.iter(|| black_box(scan(black_box("1,\"IP\",\"internet\""), "%d,\"%[^\"]\",\"%[^\"]\"")));
    });

    group.finish();
}

/// Benchmark handler selection over a realistic command set
fn bench_select(c: &mut Criterion) {
    let mut registry = HandlerRegistry::new();
    for i in 0..50 {
        registry
            .add(CommandHandler::with_static_response(
                CommandType::Exec,
                format!("+C{:03}", i),
                "",
            ))
            .unwrap();
    }
    registry
        .add(CommandHandler::with_static_response(CommandType::OneIntArg, "X", ""))
        .unwrap();
    registry
        .add(CommandHandler::with_static_response(CommandType::Wildcard, "D", ""))
        .unwrap();
    let handlers = registry.snapshot();

    let mut group = c.benchmark_group("select");
    group.throughput(Throughput::Elements(1));

    group.bench_function("exact_last", |b| {
        b.iter(|| black_box(select(&handlers, black_box(b"+C049"), CommandType::Exec)));
    });

    group.bench_function("one_int_arg", |b| {
        b.iter(|| black_box(select(&handlers, black_box(b"X4"), CommandType::Exec)));
    });

    group.bench_function("wildcard", |b| {
        b.iter(|| black_box(select(&handlers, black_box(b"D5551234"), CommandType::Exec)));
    });

    group.bench_function("unmatched", |b| {
        b.iter(|| black_box(select(&handlers, black_box(b"+COPS"), CommandType::Read)));
    });

    group.finish();
}

/// Benchmark a full command round trip
fn bench_session(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let (mut client, server_end) = tokio::io::duplex(4096);
    let config = AtServerConfig::new()
        .stream_timeout(Duration::ZERO)
        .echo_enabled(false)
        .log_enabled(false);
    let mut server = AtServer::with_stream(config, server_end).unwrap();
    server
        .add_command_handler(CommandHandler::new(CommandType::Exec, "+CSQ", |req, _, _| {
            req.send_response(format_args!("+CSQ: {},{}", 20, 5))?;
            Ok(())
        }))
        .unwrap();

    // "\r\n+CSQ: 20,5\r\n\r\nOK\r\n"
    let mut response = [0u8; 20];

    let mut group = c.benchmark_group("session");
    group.throughput(Throughput::Elements(1));

    group.bench_function("csq_round_trip", |b| {
        b.iter(|| {
            rt.block_on(async {
                client.write_all(b"AT+CSQ\r").await.unwrap();
                server.process().await.unwrap();
                client.read_exact(&mut response).await.unwrap();
            });
            black_box(&response);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_select, bench_session);

criterion_main!(benches);
