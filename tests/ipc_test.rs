//! Wire protocol framing and negotiation.

use cindex::ipc::{
   self, IndexReport, Request, Response, ResponseData, SocketBuffer,
};

#[test]
fn handshake_highest_common_version() {
   let negotiated = ipc::negotiate_protocol(&[1, 3, 2, 99]);
   assert_eq!(negotiated, Some(1));
   assert_eq!(ipc::negotiate_protocol(&[99]), None);
   assert_eq!(ipc::negotiate_protocol(&[]), None);
}

#[tokio::test]
async fn request_and_response_roundtrip() {
   let (mut client, mut server) = tokio::io::duplex(8192);
   let mut buffer = SocketBuffer::new();

   let request = Request::new("index", vec!["--force".to_string(), "--wait".to_string()]);
   buffer.send(&mut client, &request).await.unwrap();

   let mut server_buffer = SocketBuffer::new();
   let received: Request = server_buffer.recv(&mut server).await.unwrap();
   assert_eq!(received.command, "index");
   assert_eq!(received.args.len(), 2);

   let response = Response::ok_data(ResponseData::Index(IndexReport {
      task_id:   "t-1".to_string(),
      coalesced: true,
      summary:   None,
   }));
   server_buffer.send(&mut server, &response).await.unwrap();

   let mut client_buffer = SocketBuffer::new();
   let received: Response = client_buffer.recv(&mut client).await.unwrap();
   assert!(received.success);
   match received.data {
      Some(ResponseData::Index(report)) => {
         assert_eq!(report.task_id, "t-1");
         assert!(report.coalesced);
      },
      other => panic!("unexpected payload: {other:?}"),
   }
}

#[tokio::test]
async fn error_response_carries_code_and_message() {
   let (mut client, mut server) = tokio::io::duplex(4096);
   let mut buffer = SocketBuffer::new();

   let response = Response::error("unknown_command", "unknown command: frobnicate");
   buffer.send(&mut client, &response).await.unwrap();

   let mut server_buffer = SocketBuffer::new();
   let received: Response = server_buffer.recv(&mut server).await.unwrap();
   assert!(!received.success);
   let error = received.error.unwrap();
   assert_eq!(error.code, "unknown_command");
   assert!(error.message.contains("frobnicate"));
}

#[tokio::test]
async fn several_exchanges_share_one_connection() {
   let (mut client, mut server) = tokio::io::duplex(8192);
   let mut out = SocketBuffer::new();
   let mut inbuf = SocketBuffer::new();

   for i in 0..3 {
      let request = Request::new("ping", vec![i.to_string()]);
      out.send(&mut client, &request).await.unwrap();
      let received: Request = inbuf.recv(&mut server).await.unwrap();
      assert_eq!(received.args, vec![i.to_string()]);
   }
}
