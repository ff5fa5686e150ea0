#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LockRequest {
    /// Name of the lock to acquire. Required.
    #[prost(string, tag = "1")]
    pub key: ::prost::alloc::string::String,
    /// When true, a single non-blocking acquisition attempt is made; when
    /// false (the default), the call blocks, retrying until the stream's
    /// context is cancelled.
    #[prost(bool, tag = "2")]
    pub try_lock: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LockResponse {
    #[prost(enumeration = "LockEvent", tag = "1")]
    pub event: i32,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LockEvent {
    Unspecified = 0,
    Acquired = 1,
    Failed = 2,
}
#[doc = r" Generated client implementations."]
pub mod dlock_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
    use tonic::codegen::*;
    #[doc = " Distributed mutual-exclusion service. A single `Lock` call holds the"]
    #[doc = " server-streaming connection open for as long as the lock is held; the"]
    #[doc = " lock is released when the stream ends (normally or on cancel) or when"]
    #[doc = " the storage backend reports the lease as lost."]
    #[derive(Debug, Clone)]
    pub struct DlockClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl DlockClient<tonic::transport::Channel> {
        #[doc = r" Attempt to create a new client by connecting to a given endpoint."]
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: std::convert::TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> DlockClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::ResponseBody: Body + Send + Sync + 'static,
        T::Error: Into<StdError>,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_interceptor<F>(
            inner: T,
            interceptor: F,
        ) -> DlockClient<InterceptedService<T, F>>
        where
            F: tonic::service::Interceptor,
            T: tonic::codegen::Service<
                http::Request<tonic::body::BoxBody>,
                Response = http::Response<
                    <T as tonic::client::GrpcService<tonic::body::BoxBody>>::ResponseBody,
                >,
            >,
            <T as tonic::codegen::Service<http::Request<tonic::body::BoxBody>>>::Error:
                Into<StdError> + Send + Sync,
        {
            DlockClient::new(InterceptedService::new(inner, interceptor))
        }
        #[doc = r" Compress requests with `gzip`."]
        #[doc = r""]
        #[doc = r" This requires the server to support it otherwise it might respond with an"]
        #[doc = r" error."]
        pub fn send_gzip(mut self) -> Self {
            self.inner = self.inner.send_gzip();
            self
        }
        #[doc = r" Enable decompressing responses with `gzip`."]
        pub fn accept_gzip(mut self) -> Self {
            self.inner = self.inner.accept_gzip();
            self
        }
        pub async fn lock(
            &mut self,
            request: impl tonic::IntoRequest<super::LockRequest>,
        ) -> Result<tonic::Response<tonic::codec::Streaming<super::LockResponse>>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/dlock.v1alpha1.Dlock/Lock");
            self.inner
                .server_streaming(request.into_request(), path, codec)
                .await
        }
    }
}
#[doc = r" Generated server implementations."]
pub mod dlock_server {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
    use tonic::codegen::*;
    #[doc = "Generated trait containing gRPC methods that should be implemented for use with DlockServer."]
    #[async_trait]
    pub trait Dlock: Send + Sync + 'static {
        #[doc = "Server streaming response type for the Lock method."]
        type LockStream: futures_core::Stream<Item = Result<super::LockResponse, tonic::Status>>
            + Send
            + Sync
            + 'static;
        async fn lock(
            &self,
            request: tonic::Request<super::LockRequest>,
        ) -> Result<tonic::Response<Self::LockStream>, tonic::Status>;
    }
    #[doc = " Distributed mutual-exclusion service. A single `Lock` call holds the"]
    #[doc = " server-streaming connection open for as long as the lock is held; the"]
    #[doc = " lock is released when the stream ends (normally or on cancel) or when"]
    #[doc = " the storage backend reports the lease as lost."]
    #[derive(Debug)]
    pub struct DlockServer<T: Dlock> {
        inner: _Inner<T>,
        accept_compression_encodings: (),
        send_compression_encodings: (),
    }
    struct _Inner<T>(Arc<T>);
    impl<T: Dlock> DlockServer<T> {
        pub fn new(inner: T) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner);
            Self {
                inner,
                accept_compression_encodings: Default::default(),
                send_compression_encodings: Default::default(),
            }
        }
        pub fn with_interceptor<F>(inner: T, interceptor: F) -> InterceptedService<Self, F>
        where
            F: tonic::service::Interceptor,
        {
            InterceptedService::new(Self::new(inner), interceptor)
        }
    }
    impl<T, B> tonic::codegen::Service<http::Request<B>> for DlockServer<T>
    where
        T: Dlock,
        B: Body + Send + Sync + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = Never;
        type Future = BoxFuture<Self::Response, Self::Error>;
        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();
            match req.uri().path() {
                "/dlock.v1alpha1.Dlock/Lock" => {
                    #[allow(non_camel_case_types)]
                    struct LockSvc<T: Dlock>(pub Arc<T>);
                    impl<T: Dlock> tonic::server::ServerStreamingService<super::LockRequest> for LockSvc<T> {
                        type Response = super::LockResponse;
                        type ResponseStream = T::LockStream;
                        type Future =
                            BoxFuture<tonic::Response<Self::ResponseStream>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::LockRequest>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).lock(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = LockSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(
                            accept_compression_encodings,
                            send_compression_encodings,
                        );
                        let res = grpc.server_streaming(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", "12")
                        .header("content-type", "application/grpc")
                        .body(empty_body())
                        .unwrap())
                }),
            }
        }
    }
    impl<T: Dlock> Clone for DlockServer<T> {
        fn clone(&self) -> Self {
            let inner = self.inner.clone();
            Self {
                inner,
                accept_compression_encodings: self.accept_compression_encodings,
                send_compression_encodings: self.send_compression_encodings,
            }
        }
    }
    impl<T: Dlock> Clone for _Inner<T> {
        fn clone(&self) -> Self {
            Self(self.0.clone())
        }
    }
    impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }
    impl<T: Dlock> tonic::transport::NamedService for DlockServer<T> {
        const NAME: &'static str = "dlock.v1alpha1.Dlock";
    }
}
