//! Request/response client over a [`Transport`]
//!
//! One request is in flight at a time. Every reply is checked against the
//! request id it should answer before its flags are looked at.

use tracing::{debug, warn};

use super::message::{Framed, WireMessage};
use super::ops::{
    DeleteFlags, InsertFlags, QueryOptions, UpdateFlags, build_delete_message, build_get_more_message,
    build_insert_message, build_kill_cursors_message, build_query_message, build_update_message,
};
use super::reply::Reply;
use super::request_id::RequestIdGenerator;
use crate::bson::{BsonShape, Document, to_document};
use crate::error::Result;
use crate::transport::Transport;

pub struct WireClient<T> {
    transport: T,
    request_ids: RequestIdGenerator,
}

impl<T: Transport> WireClient<T> {
    pub fn new(transport: T) -> Self {
        Self::with_request_ids(transport, RequestIdGenerator::new())
    }

    pub fn with_request_ids(transport: T, request_ids: RequestIdGenerator) -> Self {
        Self { transport, request_ids }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send a request that gets no reply
    async fn fire(&mut self, message: WireMessage<Framed>) -> Result<()> {
        self.transport.send(message).await?;
        Ok(())
    }

    /// Send a request and wait for the reply that answers it
    async fn round_trip(&mut self, message: WireMessage<Framed>) -> Result<Reply> {
        let request_id = message.request_id();
        let sent = self.transport.send(message).await?;
        let bytes = self.transport.receive().await?;

        let reply = Reply::parse(&bytes)?;
        if let Err(e) = reply.check_response_to(request_id) {
            warn!(request_id, response_to = reply.response_to(), "reply correlation mismatch");
            return Err(e);
        }
        debug!(
            op = %sent.op_code(),
            request_id,
            returned = reply.number_returned(),
            "round trip complete"
        );
        reply.into_result()
    }

    /// Insert documents; no reply is read
    pub async fn insert(&mut self, namespace: &str, documents: &[Document], flags: InsertFlags) -> Result<()> {
        let message = build_insert_message(self.request_ids.next_id(), namespace, documents, flags)?;
        self.fire(message).await
    }

    /// Insert structures through their field binding
    pub async fn insert_values<S: BsonShape>(&mut self, namespace: &str, values: &[S]) -> Result<()> {
        let documents = values.iter().map(to_document).collect::<Result<Vec<_>>>()?;
        self.insert(namespace, &documents, InsertFlags::NONE).await
    }

    /// Run a query and return the first batch
    pub async fn query(&mut self, namespace: &str, query: &Document, options: &QueryOptions) -> Result<Reply> {
        let message = build_query_message(self.request_ids.next_id(), namespace, query, options)?;
        self.round_trip(message).await
    }

    /// Run a query and decode the first batch into `S`
    pub async fn find<S: BsonShape>(&mut self, namespace: &str, query: &Document, options: &QueryOptions) -> Result<Vec<S>> {
        self.query(namespace, query, options).await?.decode()
    }

    /// Fetch the next batch of an open cursor
    pub async fn get_more(&mut self, namespace: &str, number_to_return: i32, cursor_id: i64) -> Result<Reply> {
        let message = build_get_more_message(self.request_ids.next_id(), namespace, number_to_return, cursor_id)?;
        self.round_trip(message).await
    }

    pub async fn kill_cursors(&mut self, cursor_ids: &[i64]) -> Result<()> {
        let message = build_kill_cursors_message(self.request_ids.next_id(), cursor_ids)?;
        self.fire(message).await
    }

    pub async fn update(
        &mut self,
        namespace: &str,
        selector: &Document,
        update: &Document,
        flags: UpdateFlags,
    ) -> Result<()> {
        let message = build_update_message(self.request_ids.next_id(), namespace, selector, update, flags)?;
        self.fire(message).await
    }

    pub async fn delete(&mut self, namespace: &str, selector: &Document, flags: DeleteFlags) -> Result<()> {
        let message = build_delete_message(self.request_ids.next_id(), namespace, selector, flags)?;
        self.fire(message).await
    }
}
