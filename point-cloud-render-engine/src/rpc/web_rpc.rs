use std::path::PathBuf;

use bevy::diagnostic::DiagnosticsStore;
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::loading::progress::LoadingProgress;
use crate::engine::loading::stream_loader::LoadRequest;
use crate::engine::optimisation::systems::{StartOptimisation, StopOptimisation};
use crate::engine::params::parameter_store::ParameterStore;
use crate::engine::params::render_params::RenderParam;
use crate::engine::systems::fps_tracking::smoothed_fps;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
use web_sys::{MessageEvent, window};

/// JSON-RPC 2.0 request structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 notification structure for one-way communication.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Resource managing bidirectional RPC communication with the host page.
/// Handles both request-response patterns and notification broadcasting.
#[derive(Resource, Default)]
pub struct WebRpcInterface {
    outgoing_notifications: Vec<RpcNotification>,
    outgoing_responses: Vec<RpcResponse>,
}

impl WebRpcInterface {
    /// Send notification to the host page without expecting a response.
    pub fn send_notification(&mut self, method: &str, params: serde_json::Value) {
        self.outgoing_notifications.push(RpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        });
    }

    /// Queue response for transmission to the host page.
    fn queue_response(&mut self, response: RpcResponse) {
        self.outgoing_responses.push(response);
    }
}

/// Plugin establishing WebRPC communication layer for iframe-based deployment.
pub struct WebRpcPlugin;

impl Plugin for WebRpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WebRpcInterface>()
            .add_event::<IncomingRpcMessage>()
            .add_systems(
                Update,
                (
                    process_incoming_messages,
                    handle_rpc_messages,
                    send_outgoing_messages,
                )
                    .chain(),
            );

        #[cfg(target_arch = "wasm32")]
        app.add_systems(Startup, setup_message_listener);
    }
}

#[cfg(target_arch = "wasm32")]
fn setup_message_listener(mut commands: Commands) {
    use std::sync::Arc;
    use std::sync::Mutex;

    // Thread-safe message queue for cross-thread communication.
    let message_queue: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let queue_clone = message_queue.clone();

    let closure = Closure::wrap(Box::new(move |event: MessageEvent| {
        // Filter messages to ensure they contain string data.
        if let Ok(data) = event.data().dyn_into::<js_sys::JsString>() {
            let message_str: String = data.into();

            // Attempt JSON parsing to validate RPC format before queuing.
            if message_str.contains("jsonrpc") {
                if let Ok(mut queue) = queue_clone.lock() {
                    queue.push(message_str);
                }
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);

    if let Some(window) = window() {
        if let Err(e) =
            window.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
        {
            error!("Failed to register message listener: {:?}", e);
        }
    }

    // Prevent closure from being dropped by transferring ownership to JS.
    closure.forget();
    commands.insert_resource(MessageQueue(message_queue));
}

/// Resource wrapping thread-safe message queue for WASM event handling.
#[derive(Resource)]
struct MessageQueue(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

/// Event representing incoming RPC message from the host page.
#[derive(Event)]
struct IncomingRpcMessage {
    content: String,
}

fn process_incoming_messages(
    message_queue: Option<Res<MessageQueue>>,
    mut message_events: EventWriter<IncomingRpcMessage>,
) {
    let Some(queue_res) = message_queue else {
        return;
    };

    let messages = if let Ok(mut queue) = queue_res.0.lock() {
        std::mem::take(&mut *queue)
    } else {
        Vec::new()
    };

    // Write events using the non-deprecated method.
    for message_str in messages {
        message_events.write(IncomingRpcMessage {
            content: message_str,
        });
    }
}

/// Resources and event writers RPC commands act on.
#[derive(SystemParam)]
struct RpcContext<'w> {
    diagnostics: Res<'w, DiagnosticsStore>,
    store: ResMut<'w, ParameterStore>,
    progress: Res<'w, LoadingProgress>,
    load_requests: EventWriter<'w, LoadRequest>,
    optimisation_starts: EventWriter<'w, StartOptimisation>,
    optimisation_stops: EventWriter<'w, StopOptimisation>,
}

fn handle_rpc_messages(
    mut events: EventReader<IncomingRpcMessage>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut context: RpcContext,
) {
    for event in events.read() {
        match serde_json::from_str::<RpcRequest>(&event.content) {
            Ok(request) => {
                debug!("Processing RPC method: {}", request.method);
                if let Some(response) = handle_rpc_request(&request, &mut context) {
                    rpc_interface.queue_response(response);
                }
            }
            Err(parse_error) => {
                warn!("Discarding malformed RPC message: {}", parse_error);
            }
        }
    }
}

/// A parsed, validated RPC call.
#[derive(Debug, Clone, PartialEq)]
enum RpcCommand {
    LoadFile { path: PathBuf },
    StartOptimisation { target_fps: f32 },
    StopOptimisation,
    SetRenderParam { param: RenderParam, value: f32 },
    GetRenderParams,
    GetFps,
    GetLoadStatus,
}

fn parse_params<T: DeserializeOwned>(params: &serde_json::Value, expected: &str) -> Result<T, RpcError> {
    serde_json::from_value::<T>(params.clone()).map_err(|_| RpcError::invalid_params(expected))
}

fn parse_command(request: &RpcRequest) -> Result<RpcCommand, RpcError> {
    #[derive(Deserialize)]
    struct LoadFileParams {
        path: PathBuf,
    }

    #[derive(Deserialize)]
    struct StartOptimisationParams {
        target_fps: f32,
    }

    #[derive(Deserialize)]
    struct SetRenderParamParams {
        name: String,
        value: f32,
    }

    match request.method.as_str() {
        "load_file" => {
            let params: LoadFileParams = parse_params(&request.params, "Expected 'path' parameter")?;
            Ok(RpcCommand::LoadFile { path: params.path })
        }
        "start_optimisation" => {
            let params: StartOptimisationParams =
                parse_params(&request.params, "Expected 'target_fps' parameter")?;
            if !params.target_fps.is_finite() || params.target_fps <= 0.0 {
                return Err(RpcError::invalid_params("'target_fps' must be positive"));
            }
            Ok(RpcCommand::StartOptimisation {
                target_fps: params.target_fps,
            })
        }
        "stop_optimisation" => Ok(RpcCommand::StopOptimisation),
        "set_render_param" => {
            let params: SetRenderParamParams =
                parse_params(&request.params, "Expected 'name' and 'value' parameters")?;
            let param = RenderParam::from_name(&params.name).ok_or_else(|| {
                RpcError::invalid_params(&format!("Unknown render parameter: {}", params.name))
            })?;
            if !params.value.is_finite() {
                return Err(RpcError::invalid_params("'value' must be finite"));
            }
            Ok(RpcCommand::SetRenderParam {
                param,
                value: params.value,
            })
        }
        "get_render_params" => Ok(RpcCommand::GetRenderParams),
        "get_fps" => Ok(RpcCommand::GetFps),
        "get_load_status" => Ok(RpcCommand::GetLoadStatus),
        _ => Err(RpcError::method_not_found(&request.method)),
    }
}

/// Handle individual RPC request and generate response based on method.
/// Notifications (no ID) are executed without a response.
fn handle_rpc_request(request: &RpcRequest, context: &mut RpcContext) -> Option<RpcResponse> {
    let result = parse_command(request).and_then(|command| execute_command(command, context));
    if let Err(error) = &result {
        warn!("RPC {} failed: {}", request.method, error.message);
    }
    let id = request.id.clone()?;

    match result {
        Ok(result_value) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result_value),
            error: None,
            id: Some(id),
        }),
        Err(error) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id: Some(id),
        }),
    }
}

fn execute_command(
    command: RpcCommand,
    context: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    match command {
        RpcCommand::LoadFile { path } => {
            let source = path.display().to_string();
            context.load_requests.write(LoadRequest { path });
            Ok(serde_json::json!({ "success": true, "source": source }))
        }
        RpcCommand::StartOptimisation { target_fps } => {
            context
                .optimisation_starts
                .write(StartOptimisation { target_fps });
            Ok(serde_json::json!({ "success": true, "target_fps": target_fps }))
        }
        RpcCommand::StopOptimisation => {
            let was_running = context.store.is_optimising();
            context.optimisation_stops.write(StopOptimisation);
            Ok(serde_json::json!({ "success": true, "was_running": was_running }))
        }
        RpcCommand::SetRenderParam { param, value } => {
            let stored = context.store.set(param, value).ok_or_else(|| {
                RpcError::rejected("Render parameters are owned by the running optimisation")
            })?;
            Ok(serde_json::json!({ "success": true, "name": param.name(), "value": stored }))
        }
        RpcCommand::GetRenderParams => Ok(render_params_json(&context.store)),
        RpcCommand::GetFps => Ok(serde_json::json!({
            "fps": smoothed_fps(&context.diagnostics).unwrap_or(0.0)
        })),
        RpcCommand::GetLoadStatus => serde_json::to_value(&*context.progress)
            .map_err(|error| RpcError::internal_error(&error.to_string())),
    }
}

fn render_params_json(store: &ParameterStore) -> serde_json::Value {
    serde_json::json!({
        "params": store.current(),
        "ranges": store.ranges(),
        "optimising": store.is_optimising(),
        "target_fps": store.target_fps(),
    })
}

/// Send queued notifications and responses to the host page.
fn send_outgoing_messages(mut rpc_interface: ResMut<WebRpcInterface>) {
    // Send notifications first.
    for notification in rpc_interface.outgoing_notifications.drain(..) {
        send_message_to_parent(&notification);
    }

    // Send responses second to maintain order.
    for response in rpc_interface.outgoing_responses.drain(..) {
        send_message_to_parent(&response);
    }
}

/// Send serialized message to parent window (the host page).
fn send_message_to_parent<T: Serialize>(message: &T) {
    #[cfg(target_arch = "wasm32")]
    {
        match serde_json::to_string(message) {
            Ok(json) => {
                if let Some(window) = window() {
                    if let Some(parent) = window.parent().ok().flatten() {
                        if let Err(e) = parent.post_message(&JsValue::from_str(&json), "*") {
                            error!("Failed to send message to parent: {:?}", e);
                        }
                    } else {
                        warn!("No parent window available for message transmission");
                    }
                } else {
                    error!("Window object not available");
                }
            }
            Err(e) => {
                error!("Failed to serialize message: {}", e);
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        // No-op for non-WASM targets.
        let _ = message;
    }
}

/// Standard RPC error codes and constructors.
impl RpcError {
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "Method not found".to_string(),
            data: Some(serde_json::json!({ "method": method })),
        }
    }

    /// Valid request the engine cannot honour in its current state.
    pub fn rejected(message: &str) -> Self {
        Self {
            code: -32000,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn invalid_params(message: &str) -> Self {
        Self {
            code: -32602,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, params: serde_json::Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: Some(serde_json::json!(1)),
        }
    }

    #[test]
    fn parses_every_method() {
        let cases = [
            (
                request("load_file", serde_json::json!({ "path": "scans/site.las" })),
                RpcCommand::LoadFile {
                    path: PathBuf::from("scans/site.las"),
                },
            ),
            (
                request("start_optimisation", serde_json::json!({ "target_fps": 60 })),
                RpcCommand::StartOptimisation { target_fps: 60.0 },
            ),
            (
                request("stop_optimisation", serde_json::Value::Null),
                RpcCommand::StopOptimisation,
            ),
            (
                request(
                    "set_render_param",
                    serde_json::json!({ "name": "thinning_factor", "value": 3.0 }),
                ),
                RpcCommand::SetRenderParam {
                    param: RenderParam::ThinningFactor,
                    value: 3.0,
                },
            ),
            (
                request("get_render_params", serde_json::Value::Null),
                RpcCommand::GetRenderParams,
            ),
            (request("get_fps", serde_json::Value::Null), RpcCommand::GetFps),
            (
                request("get_load_status", serde_json::Value::Null),
                RpcCommand::GetLoadStatus,
            ),
        ];
        for (request, expected) in cases {
            assert_eq!(parse_command(&request).unwrap(), expected);
        }
    }

    #[test]
    fn rejects_bad_params() {
        let missing = parse_command(&request("load_file", serde_json::json!({}))).unwrap_err();
        assert_eq!(missing.code, -32602);

        let negative = parse_command(&request(
            "start_optimisation",
            serde_json::json!({ "target_fps": -5.0 }),
        ))
        .unwrap_err();
        assert_eq!(negative.code, -32602);

        let unknown = parse_command(&request(
            "set_render_param",
            serde_json::json!({ "name": "gamma", "value": 1.0 }),
        ))
        .unwrap_err();
        assert_eq!(unknown.code, -32602);
    }

    #[test]
    fn unknown_methods_are_not_found() {
        let error = parse_command(&request("tool_selection", serde_json::json!({}))).unwrap_err();
        assert_eq!(error.code, -32601);
        assert_eq!(
            error.data,
            Some(serde_json::json!({ "method": "tool_selection" }))
        );
    }

    #[test]
    fn requests_without_params_still_parse() {
        let request: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"get_fps","id":7}"#).unwrap();
        assert_eq!(parse_command(&request).unwrap(), RpcCommand::GetFps);
    }

    #[test]
    fn notifications_queue_in_order() {
        let mut rpc_interface = WebRpcInterface::default();
        rpc_interface.send_notification("load_progress", serde_json::json!({ "progress": 0.5 }));
        rpc_interface.send_notification("load_complete", serde_json::json!({ "points": 10 }));

        let methods: Vec<&str> = rpc_interface
            .outgoing_notifications
            .iter()
            .map(|notification| notification.method.as_str())
            .collect();
        assert_eq!(methods, vec!["load_progress", "load_complete"]);
    }
}
