pub mod calculate { pub struct Response<'a> { pub digits: u8, pub response: &'a [u8] } }
pub struct YubiKey;
impl YubiKey {
    pub fn connect(_b: &mut Vec<u8>) -> std::io::Result<Self> { unimplemented!() }
    pub fn select(&self, _b: &mut Vec<u8>) -> std::io::Result<()> { unimplemented!() }
    pub fn calculate<'a>(&self, _t: bool, _n: &[u8], _c: &[u8], _b: &'a mut Vec<u8>) -> std::io::Result<calculate::Response<'a>> { unimplemented!() }
}
