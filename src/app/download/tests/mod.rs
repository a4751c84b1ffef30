//! Downloader tests against a mock HTTP server and local `file:` sources
