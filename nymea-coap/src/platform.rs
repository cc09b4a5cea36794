use core::fmt::Debug;
use core::marker::PhantomData;

use crate::net::{Resolve, Socket};
use crate::time::Clock;

/// The pieces of the outside world the engine is generic over
pub trait Platform: Sized + 'static + Debug {
  /// What should we use to keep track of time?
  type Clock: Clock;

  /// What should we use for networking?
  type Socket: Socket;

  /// How should host names be resolved?
  type Resolver: Resolve;
}

/// Configures the engine with concrete clock, socket and resolver types.
///
/// ```
/// use nymea_coap::platform::Alloc;
///
/// type MyPlatform = Alloc<nymea_coap::std::Clock, std::net::UdpSocket, nymea_coap::std::Dns>;
/// ```
#[derive(Debug)]
pub struct Alloc<Clk, Sock, Res>(PhantomData<(Clk, Sock, Res)>)
  where Clk: Clock + Debug + 'static,
        Sock: Socket + Debug + 'static,
        Res: Resolve + Debug + 'static;

impl<Clk, Sock, Res> Platform for Alloc<Clk, Sock, Res>
  where Clk: Clock + Debug + 'static,
        Sock: Socket + Debug + 'static,
        Res: Resolve + Debug + 'static
{
  type Clock = Clk;
  type Socket = Sock;
  type Resolver = Res;
}

/// Default platform for std: [`crate::std::Clock`], [`std::net::UdpSocket`]
/// and [`crate::std::Dns`]
pub type Std = Alloc<crate::std::Clock, ::std::net::UdpSocket, crate::std::Dns>;
