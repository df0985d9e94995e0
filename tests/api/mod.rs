mod session_tests;
mod websocket_tests;
