use futures_util::{AsyncReadExt, AsyncWriteExt};
use hpipe_h1::Served;
use std::io;

mod common;

#[async_std::test]
async fn server_upgrade_echo() -> io::Result<()> {
    let conn = common::run_server(|served| async move {
        match served {
            Served::Upgrade(req, mut upgraded) => {
                assert!(req.is_upgrade());
                assert_eq!(req.header("upgrade").as_deref(), Some("echo"));

                upgraded
                    .write_all(
                        b"HTTP/1.1 101 Switching Protocols\r\n\
                          Connection: Upgrade\r\nUpgrade: echo\r\n\r\n",
                    )
                    .await
                    .unwrap();

                // bytes sent along with the request head arrive first
                let mut buf = [0_u8; 4];
                upgraded.read_exact(&mut buf).await.unwrap();
                upgraded.write_all(&buf).await.unwrap();
            }
            other => panic!("unexpected: {:?}", other),
        }
    })
    .await?;

    let mut tcp = conn.connect().await?;

    tcp.write_all(b"GET /chat HTTP/1.1\r\nConnection: Upgrade\r\nUpgrade: echo\r\n\r\nping")
        .await?;

    let head = common::read_header(&mut tcp).await?;
    assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));

    let echoed = common::read_body(&mut tcp, 4).await?;
    assert_eq!(&echoed, b"ping");

    Ok(())
}

#[async_std::test]
async fn server_connect_tunnel() -> io::Result<()> {
    let conn = common::run_server(|served| async move {
        match served {
            Served::Upgrade(req, mut upgraded) => {
                assert_eq!(req.method().as_str(), "CONNECT");
                assert_eq!(req.uri().to_string(), "example.com:443");

                upgraded
                    .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
                    .await
                    .unwrap();

                let mut buf = [0_u8; 6];
                upgraded.read_exact(&mut buf).await.unwrap();
                upgraded.write_all(&buf).await.unwrap();
            }
            other => panic!("unexpected: {:?}", other),
        }
    })
    .await?;

    let mut tcp = conn.connect().await?;

    tcp.write_all(b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n")
        .await?;

    let head = common::read_header(&mut tcp).await?;
    assert!(head.starts_with("HTTP/1.1 200 Connection Established\r\n"));

    tcp.write_all(b"tunnel").await?;

    let echoed = common::read_body(&mut tcp, 6).await?;
    assert_eq!(&echoed, b"tunnel");

    Ok(())
}

#[async_std::test]
async fn server_auto_continue() -> io::Result<()> {
    let conn = common::run_server(|served| async move {
        if let Served::Request(mut req, mut res) = served {
            let body = req.body_mut().read_to_vec().await.unwrap();
            assert_eq!(&body, b"hello");

            res.set_send_date(false);
            res.set_header("content-length", "2").unwrap();
            res.end(Some(b"ok")).unwrap();
        }
    })
    .await?;

    let mut tcp = conn.connect().await?;

    tcp.write_all(b"PUT /up HTTP/1.1\r\ncontent-length: 5\r\nExpect: 100-continue\r\n\r\n")
        .await?;

    // the interim response comes without the handler doing anything
    let head = common::read_header(&mut tcp).await?;
    assert_eq!(head, "HTTP/1.1 100 Continue\r\n\r\n");

    tcp.write_all(b"hello").await?;

    let head = common::read_header(&mut tcp).await?;
    assert_eq!(
        head,
        "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nConnection: keep-alive\r\n\r\n"
    );

    let body = common::read_body(&mut tcp, 2).await?;
    assert_eq!(&body, b"ok");

    Ok(())
}

#[async_std::test]
async fn server_manual_continue() -> io::Result<()> {
    let conn = common::run_server_with(
        |served| async move {
            match served {
                Served::CheckContinue(mut req, mut res) => {
                    assert_eq!(req.header("expect").as_deref(), Some("100-continue"));

                    res.write_continue().unwrap();

                    let body = req.body_mut().read_to_vec().await.unwrap();
                    assert_eq!(&body, b"hello");

                    res.set_send_date(false);
                    res.set_header("content-length", "2").unwrap();
                    res.end(Some(b"ok")).unwrap();
                }
                other => panic!("unexpected: {:?}", other),
            }
        },
        false,
    )
    .await?;

    let mut tcp = conn.connect().await?;

    tcp.write_all(b"PUT /up HTTP/1.1\r\ncontent-length: 5\r\nExpect: 100-continue\r\n\r\n")
        .await?;

    let head = common::read_header(&mut tcp).await?;
    assert_eq!(head, "HTTP/1.1 100 Continue\r\n\r\n");

    tcp.write_all(b"hello").await?;

    let head = common::read_header(&mut tcp).await?;
    assert_eq!(
        head,
        "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nConnection: keep-alive\r\n\r\n"
    );

    Ok(())
}
