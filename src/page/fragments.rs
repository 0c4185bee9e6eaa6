//! Fixed page chrome. The composer measures these slices directly, so editing
//! any of them keeps the declared content length correct.

pub const DOCTYPE: &str = "<!DOCTYPE html><html lang=\"en\"><head><meta name=\"viewport\" \
content=\"width=device-width,initial-scale=1,user-scalable=no\"/>";

pub const TITLE_OPEN: &str = "<title>";
pub const TITLE_CLOSE: &str = "</title>";

pub const SCRIPT: &str = "<script>function c(l){document.getElementById('s').value=\
l.innerText||l.textContent;document.getElementById('p').focus();}</script>";

pub const STYLE: &str = "<style>\
body,.c{text-align:center;}\
div,input{padding:5px;font-size:1em;}\
input{width:90%;}\
input[type=checkbox],input[type=radio]{width:1em;}\
input:invalid{border:1px solid red;}\
body{font-family:verdana;width:60%;margin:auto;}\
button{border:0;border-radius:0.6rem;background-color:#0af;color:#eee;line-height:2.4rem;\
font-size:1.2rem;width:100%;}\
.red{background-color:#f33;}\
</style>";

/// Sends the browser back to the menu after 15 seconds.
pub const META_GO_BACK: &str = "<meta http-equiv='refresh' content='15;url=/'/>";

pub const HEADER_END: &str =
    "</head><body><div style='text-align:left;display:inline-block;min-width:260px;'>";

pub const FOOTER_OPEN: &str =
    "<div style='text-align:right;font-size:11px;'><hr/><a href='/about' style='color:#aaa;'>panelweb ";

pub const FOOTER_CLOSE: &str = "</a></div></body></html>";

/// Dynamic bodies above this size no longer fit the device page buffer.
pub const PAGE_BUFFER_SIZE: usize = 6 * 256;
