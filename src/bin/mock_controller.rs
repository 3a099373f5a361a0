/// Mock fill controller for exercising the supervisor end to end
/// Serves a canned status report and fill acknowledgement on the same two
/// endpoints the real hardware exposes. Point CONTROLLER_ADDR at this and the
/// supervisor cannot tell the difference.

use axum::{Router, routing::get};
use clap::Parser;

#[derive(Parser)]
#[command(about = "Fake LN2 fill controller for testing the supervisor")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value_t = 5000)]
    port: u16,
}

const STATUS_MESSAGE: &str = "\
# University of Liverpool - Nuclear Physics - LN2 Fill System

# Status Report:
 Current system time is 672601s (18:50:1 5 8/1/1970)
Minimum fill time: 5 s
Maximum fill time: 15 s
Fill hold time: 2 s
Main tank valve is Closed
| LineNum |\tActive? |\tLED Pin |\tLED Thresh |\tADC val |\tLED V |\tValve Pin\t|Valve Status\t|\tLast Fill Status

| 1\t |\tY\t |\t0\t |\t1.90\t |\t139\t |\t0.69\t|\t11\t |\tCl\t|\tSucc! (10)
| 2\t |\tY\t |\t1\t |\t1.90\t |\t138\t |\t0.68\t|\t9\t |\tCl\t|\tFail! (0)
| 3\t |\tN\t |\t2\t |\t1.90\t |\t842\t |\t4.17\t|\t10\t |\tCl\t|\tFail! (0)
| 4\t |\tN\t |\t3\t |\t1.90\t |\t844\t |\t4.18\t|\t8\t |\tCl\t|\tFail! (0)


Led values for last fill in 10s intervals:

Time  : 0   10  20  30  40  50  60  70
Line 1: 300 400 500 500 500 500 500 500
Line 2: 0
Line 3: 0
Line 4: 0";

const FILL_MESSAGE: &str = "\
Filling all active lines...

Opening supply tank valve...Opening line 1 -  Current system time is 534236s (4:23:56 4 7/1/1970)
Opening line 2 -  Current system time is 534237s (4:23:57 4 7/1/1970)";

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let app = Router::new()
        .route("/", get(|| async { "Fake fill controller for testing" }))
        .route("/arduino/readstatus/0", get(|| async { STATUS_MESSAGE }))
        .route("/arduino/fillall/0", get(|| async { FILL_MESSAGE }));

    let addr = format!("0.0.0.0:{}", args.port);
    println!("Mock fill controller listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind mock controller port");
    axum::serve(listener, app)
        .await
        .expect("mock controller server failed");
}
