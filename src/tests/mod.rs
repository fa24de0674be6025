// Test modules for Chat Sync
// Each module covers the corresponding source module; `support` holds the fakes

mod support;

mod http_tests;
