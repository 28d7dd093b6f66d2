//! Integration tests for the MCP client and gateway.
//!
//! A small in-process HTTP server speaks enough of the streamable HTTP
//! transport to drive the real client end to end.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use docent_mcp::{
    GatewayPolicy, McpClient, McpConnector, McpError, McpServerConfig, ToolGateway,
};

const SESSION: &str = "session-42";

/// What the server saw: (HTTP method, JSON-RPC method, session header).
type Seen = Arc<Mutex<Vec<(String, String, Option<String>)>>>;

struct MockServer {
    url: String,
    seen: Seen,
}

impl MockServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let log = log.clone();
                tokio::spawn(async move {
                    let _ = handle(stream, log).await;
                });
            }
        });
        Self {
            url: format!("http://{}/mcp/", addr),
            seen,
        }
    }

    fn seen(&self) -> Vec<(String, String, Option<String>)> {
        self.seen.lock().clone()
    }
}

async fn handle(mut stream: TcpStream, seen: Seen) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let http_method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("")
        .to_string();
    let mut content_length = 0usize;
    let mut session = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name == "content-length" {
                content_length = value.parse().unwrap_or(0);
            } else if name == "mcp-session-id" {
                session = Some(value.to_string());
            }
        }
    }
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    if http_method == "DELETE" {
        seen.lock().push((http_method, String::new(), session));
        return respond(&mut stream, "200 OK", "application/json", &[], "").await;
    }

    let body: Value =
        serde_json::from_slice(&buf[header_end..header_end + content_length]).unwrap_or_default();
    let method = body["method"].as_str().unwrap_or("").to_string();
    seen.lock().push((http_method, method.clone(), session));

    let id = body["id"].clone();
    match method.as_str() {
        "initialize" => {
            let reply = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "mock-docs", "version": "1.0.0"}
                }
            });
            respond(
                &mut stream,
                "200 OK",
                "application/json",
                &[("Mcp-Session-Id", SESSION)],
                &reply.to_string(),
            )
            .await
        }
        "notifications/initialized" => {
            respond(&mut stream, "202 Accepted", "application/json", &[], "").await
        }
        "tools/list" => {
            // Answered as an event stream, with a notification ahead of the response.
            let progress = json!({"jsonrpc": "2.0", "method": "notifications/progress"});
            let reply = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"tools": [
                    {
                        "name": "search",
                        "description": "Search the document database",
                        "inputSchema": {
                            "type": "object",
                            "properties": {"query": {"type": "string"}},
                            "required": ["query"]
                        }
                    },
                    {"name": "status"}
                ]}
            });
            let sse = format!(
                "event: message\ndata: {}\n\nevent: message\ndata: {}\n\n",
                progress, reply
            );
            respond(&mut stream, "200 OK", "text/event-stream", &[], &sse).await
        }
        "tools/call" => {
            let name = body["params"]["name"].as_str().unwrap_or("");
            let result = match name {
                "search" => json!({
                    "content": [{
                        "type": "text",
                        "text": format!("results for {}", body["params"]["arguments"]["query"])
                    }]
                }),
                "status" => json!({"content": []}),
                _ => json!({
                    "content": [{"type": "text", "text": format!("unknown tool {}", name)}],
                    "isError": true
                }),
            };
            let reply = json!({"jsonrpc": "2.0", "id": id, "result": result});
            respond(&mut stream, "200 OK", "application/json", &[], &reply.to_string()).await
        }
        _ => {
            let reply = json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": "Method not found"}
            });
            respond(&mut stream, "200 OK", "application/json", &[], &reply.to_string()).await
        }
    }
}

async fn respond(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    extra: &[(&str, &str)],
    body: &str,
) -> std::io::Result<()> {
    let mut out = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        content_type,
        body.len()
    );
    for (k, v) in extra {
        out.push_str(&format!("{}: {}\r\n", k, v));
    }
    out.push_str("\r\n");
    out.push_str(body);
    stream.write_all(out.as_bytes()).await?;
    stream.shutdown().await
}

fn config(url: &str) -> McpServerConfig {
    McpServerConfig::new("test", url).with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_connect_and_initialize() {
    let server = MockServer::start().await;
    let client = McpClient::connect(config(&server.url)).await.unwrap();

    assert_eq!(client.server_info().name, "mock-docs");
    assert_eq!(client.session_id().as_deref(), Some(SESSION));

    let seen = server.seen();
    assert_eq!(seen[0].1, "initialize");
    assert_eq!(seen[0].2, None);
    assert_eq!(seen[1].1, "notifications/initialized");
    assert_eq!(seen[1].2.as_deref(), Some(SESSION));
}

#[tokio::test]
async fn test_list_tools_over_event_stream() {
    let server = MockServer::start().await;
    let client = McpClient::connect(config(&server.url)).await.unwrap();

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].name, "search");
    assert!(tools[1].input_schema.is_none());
}

#[tokio::test]
async fn test_call_tool_and_session_header() {
    let server = MockServer::start().await;
    let client = McpClient::connect(config(&server.url)).await.unwrap();

    let result = client
        .call_tool("search", Some(json!({"query": "tracker"})))
        .await
        .unwrap();
    assert!(!result.is_error());
    assert_eq!(result.text().unwrap(), "results for \"tracker\"");

    let seen = server.seen();
    let call = seen.iter().find(|s| s.1 == "tools/call").unwrap();
    assert_eq!(call.2.as_deref(), Some(SESSION));
}

#[tokio::test]
async fn test_unknown_tool_reports_error() {
    let server = MockServer::start().await;
    let client = McpClient::connect(config(&server.url)).await.unwrap();
    // `tools/call` on an unknown tool is a tool-level error, not a protocol one.
    let result = client.call_tool("nope", None).await.unwrap();
    assert!(result.is_error());
}

#[tokio::test]
async fn test_shutdown_deletes_session() {
    let server = MockServer::start().await;
    let client = McpClient::connect(config(&server.url)).await.unwrap();
    client.shutdown().await.unwrap();
    assert!(client.session_id().is_none());

    let seen = server.seen();
    let delete = seen.iter().find(|s| s.0 == "DELETE").unwrap();
    assert_eq!(delete.2.as_deref(), Some(SESSION));
}

#[tokio::test]
async fn test_gateway_over_http() {
    let server = MockServer::start().await;
    let connector = Arc::new(McpConnector::new(config(&server.url)));
    let mut gateway = ToolGateway::connect(connector, GatewayPolicy::Persistent).await;

    assert!(gateway.is_connected());
    let tools = gateway.list_tools();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[1].parameters, json!({"type": "object", "properties": {}}));

    let mut args = Map::new();
    args.insert("query".to_string(), json!("calorimeter"));
    let text = gateway.invoke("search", args).await.unwrap();
    assert_eq!(text, "results for \"calorimeter\"");

    assert_eq!(gateway.invoke("status", Map::new()).await.unwrap(), "No content");

    let err = gateway.invoke("missing", Map::new()).await.unwrap_err();
    assert!(matches!(err, McpError::ToolError(ref msg) if msg == "unknown tool missing"));

    gateway.close().await;
    assert!(server.seen().iter().any(|s| s.0 == "DELETE"));
}

#[tokio::test]
async fn test_gateway_per_message_over_http() {
    let server = MockServer::start().await;
    let connector = Arc::new(McpConnector::new(config(&server.url)));
    let mut gateway = ToolGateway::connect(connector, GatewayPolicy::PerMessage).await;

    let mut args = Map::new();
    args.insert("query".to_string(), json!("straw"));
    gateway.invoke("search", args).await.unwrap();

    let seen = server.seen();
    let initializes = seen.iter().filter(|s| s.1 == "initialize").count();
    let deletes = seen.iter().filter(|s| s.0 == "DELETE").count();
    assert_eq!(initializes, 2);
    assert_eq!(deletes, 2);
}

#[tokio::test]
async fn test_gateway_unreachable_server() {
    let connector = Arc::new(McpConnector::new(
        McpServerConfig::new("down", "http://127.0.0.1:9/mcp/")
            .with_timeout(Duration::from_secs(2)),
    ));
    let gateway = ToolGateway::connect(connector, GatewayPolicy::Persistent).await;
    assert!(!gateway.is_connected());
    assert!(gateway.list_tools().is_empty());
}
